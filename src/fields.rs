//! Canonical field catalogue.
//!
//! [`FIELDS`] is the single declarative table that drives both the
//! finance-screening remapping and row validation: every canonical field
//! lists its accepted source headers (in priority order), an optional
//! positional fallback, its value kind, and whether it is required. Adding a
//! canonical field means adding a variant and one row here.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::{
    CellValue, clean_string, parse_optional_bool, parse_optional_date, parse_optional_decimal,
    parse_optional_int,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    BusinessKey,
    Name,
    Amount,
    RecordDate,
    InvoiceDate,
    InvoiceNo,
    ItemDescription,
    ProductValue,
    TaxValue,
    TotalValue,
    VinNo,
    CancelFlag,
    CancelProductValue,
    CancelTaxValue,
    CancelTotalValue,
    OrgTypeHq,
    OrgTypeBranchNo,
    TaxpayerId,
    SalePrice,
    ComFn,
    ComValue,
    RuleApplied,
    IsDuplicateTank,
    GroupId,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::BusinessKey => "business_key",
            CanonicalField::Name => "name",
            CanonicalField::Amount => "amount",
            CanonicalField::RecordDate => "record_date",
            CanonicalField::InvoiceDate => "invoice_date",
            CanonicalField::InvoiceNo => "invoice_no",
            CanonicalField::ItemDescription => "item_description",
            CanonicalField::ProductValue => "product_value",
            CanonicalField::TaxValue => "tax_value",
            CanonicalField::TotalValue => "total_value",
            CanonicalField::VinNo => "vin_no",
            CanonicalField::CancelFlag => "cancel_flag",
            CanonicalField::CancelProductValue => "cancel_product_value",
            CanonicalField::CancelTaxValue => "cancel_tax_value",
            CanonicalField::CancelTotalValue => "cancel_total_value",
            CanonicalField::OrgTypeHq => "org_type_hq",
            CanonicalField::OrgTypeBranchNo => "org_type_branch_no",
            CanonicalField::TaxpayerId => "taxpayer_id",
            CanonicalField::SalePrice => "sale_price",
            CanonicalField::ComFn => "com_fn",
            CanonicalField::ComValue => "com_value",
            CanonicalField::RuleApplied => "rule_applied",
            CanonicalField::IsDuplicateTank => "is_duplicate_tank",
            CanonicalField::GroupId => "group_id",
        }
    }

    pub fn spec(&self) -> &'static FieldSpec {
        // FIELDS is declared in variant order.
        &FIELDS[*self as usize]
    }

    pub fn is_required(&self) -> bool {
        self.spec().required
    }

    pub fn all() -> impl Iterator<Item = CanonicalField> {
        FIELDS.iter().map(|spec| spec.field)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Required fields in the order missing columns are reported.
pub const REQUIRED_FIELDS: [CanonicalField; 4] = [
    CanonicalField::BusinessKey,
    CanonicalField::Name,
    CanonicalField::Amount,
    CanonicalField::RecordDate,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Decimal,
    Date,
    Integer,
    Boolean,
}

impl FieldKind {
    /// Text columns are coalesced on cleaned strings, every other kind keeps
    /// the native cell so coercion sees the original representation.
    pub fn is_text(&self) -> bool {
        matches!(self, FieldKind::Text)
    }

    /// Best-effort coercion used for optional fields. Empty text is absence.
    pub fn coerce_optional(&self, value: &CellValue) -> Option<FieldValue> {
        match self {
            FieldKind::Text => {
                let cleaned = clean_string(value);
                (!cleaned.is_empty()).then_some(FieldValue::Text(cleaned))
            }
            FieldKind::Decimal => parse_optional_decimal(value).map(FieldValue::Decimal),
            FieldKind::Date => parse_optional_date(value).map(FieldValue::Date),
            FieldKind::Integer => parse_optional_int(value).map(FieldValue::Integer),
            FieldKind::Boolean => parse_optional_bool(value).map(FieldValue::Boolean),
        }
    }
}

#[derive(Debug)]
pub struct FieldSpec {
    pub field: CanonicalField,
    pub kind: FieldKind,
    pub required: bool,
    /// Accepted source headers, highest priority first. Lowercase, since raw
    /// headers are lowercased on ingestion.
    pub aliases: &'static [&'static str],
    /// Zero-based raw column consulted after every alias came up empty.
    pub position: Option<usize>,
}

const fn spec(
    field: CanonicalField,
    kind: FieldKind,
    required: bool,
    aliases: &'static [&'static str],
    position: Option<usize>,
) -> FieldSpec {
    FieldSpec {
        field,
        kind,
        required,
        aliases,
        position,
    }
}

use CanonicalField as F;
use FieldKind as K;

/// Finance-screening exports lay out group id, invoice number and buyer name
/// in the first three columns, the VIN in the fifth, gross and total values in
/// the seventh and eighth, and the sale price in the sixteenth.
pub static FIELDS: [FieldSpec; 24] = [
    spec(
        F::BusinessKey,
        K::Text,
        true,
        &["business_key", "group_id", "รหัสกลุ่ม"],
        Some(0),
    ),
    spec(
        F::Name,
        K::Text,
        true,
        &["name", "customer_name", "ชื่อผู้ซื้อ", "ชื่อลูกค้า", "ชื่อ"],
        Some(2),
    ),
    spec(
        F::Amount,
        K::Decimal,
        true,
        &["amount", "total_value", "total", "มูลค่ารวม", "ยอดรวม"],
        Some(7),
    ),
    spec(
        F::RecordDate,
        K::Date,
        true,
        &["record_date", "วันที่", "invoice_date", "วันที่ใบกำกับภาษี"],
        None,
    ),
    spec(
        F::InvoiceDate,
        K::Date,
        false,
        &["invoice_date", "วันที่ใบกำกับภาษี", "วันที่"],
        None,
    ),
    spec(
        F::InvoiceNo,
        K::Text,
        false,
        &["invoice_no", "เลขที่ใบกำกับภาษี", "เลขที่ใบกำกับ"],
        Some(1),
    ),
    spec(
        F::ItemDescription,
        K::Text,
        false,
        &["item_description", "รายการ", "รายละเอียดสินค้า"],
        None,
    ),
    spec(
        F::ProductValue,
        K::Decimal,
        false,
        &["product_value", "gross", "มูลค่าสินค้า"],
        Some(6),
    ),
    spec(
        F::TaxValue,
        K::Decimal,
        false,
        &["tax_value", "vat", "ภาษีมูลค่าเพิ่ม"],
        None,
    ),
    spec(
        F::TotalValue,
        K::Decimal,
        false,
        &["total_value", "total", "มูลค่ารวม", "ยอดรวม"],
        Some(7),
    ),
    spec(
        F::VinNo,
        K::Text,
        false,
        &["vin_no", "vin", "เลขตัวถัง"],
        Some(4),
    ),
    spec(
        F::CancelFlag,
        K::Text,
        false,
        &["cancel_flag", "สถานะยกเลิก", "ยกเลิก"],
        None,
    ),
    spec(
        F::CancelProductValue,
        K::Decimal,
        false,
        &["cancel_product_value", "มูลค่าสินค้ายกเลิก"],
        None,
    ),
    spec(
        F::CancelTaxValue,
        K::Decimal,
        false,
        &["cancel_tax_value", "ภาษียกเลิก"],
        None,
    ),
    spec(
        F::CancelTotalValue,
        K::Decimal,
        false,
        &["cancel_total_value", "มูลค่ารวมยกเลิก"],
        None,
    ),
    spec(
        F::OrgTypeHq,
        K::Text,
        false,
        &["org_type_hq", "สำนักงานใหญ่"],
        None,
    ),
    spec(
        F::OrgTypeBranchNo,
        K::Integer,
        false,
        &["org_type_branch_no", "สาขาที่"],
        None,
    ),
    spec(
        F::TaxpayerId,
        K::Text,
        false,
        &["taxpayer_id", "เลขประจำตัวผู้เสียภาษี"],
        None,
    ),
    spec(
        F::SalePrice,
        K::Decimal,
        false,
        &["sale_price", "ราคาขาย"],
        Some(15),
    ),
    spec(F::ComFn, K::Decimal, false, &["com_fn", "ค่าคอม fn"], None),
    spec(
        F::ComValue,
        K::Decimal,
        false,
        &["com_value", "ค่าคอมมิชชั่น"],
        None,
    ),
    spec(F::RuleApplied, K::Text, false, &["rule_applied"], None),
    spec(
        F::IsDuplicateTank,
        K::Boolean,
        false,
        &["is_duplicate_tank"],
        None,
    ),
    spec(F::GroupId, K::Text, false, &["group_id", "รหัสกลุ่ม"], None),
];

/// Strictly typed value of a canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Date(NaiveDate),
    Decimal(Decimal),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Decimal(d) => write!(f, "{d}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}
