//! # Header and Cell Normalisation
//!
//! Turns one register row into a [`CowPatch`] plus the parent tags that
//! Pass 2 resolves later.
//!
//! ## Rules
//! - headers match a fixed vocabulary, ignoring case, spaces and underscores
//! - unknown columns are ignored
//! - sentinel cells (`nan`, `NaT`, `None`, `null`, `-`, error cells, blanks)
//!   are absent and never overwrite stored data
//! - a numeric tag `1234.0` is the tag `1234`
//! - dates: Excel date cells, `YYYY-MM-DD`, `DD.MM.YYYY`, `DD/MM/YYYY`

use chrono::{Duration, NaiveDate};
use tracing::warn;

use herd_core::{CowPatch, CowStatus, Gender, Money};

use crate::workbook::Cell;

const SENTINELS: [&str; 6] = ["nan", "nat", "none", "null", "-", "n/a"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

// =============================================================================
// Field Vocabulary
// =============================================================================

/// Canonical register columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Tag,
    Name,
    BirthDate,
    Gender,
    Breed,
    PassportNumber,
    Status,
    DamTag,
    SireTag,
    ExitDate,
    ExitReason,
    SalePrice,
    MeatDeliveryDate,
    Notes,
}

impl Field {
    /// Maps a header cell to a field.
    ///
    /// ```rust
    /// use herd_import::normalize::Field;
    ///
    /// assert_eq!(Field::from_header("Ear Tag"), Some(Field::Tag));
    /// assert_eq!(Field::from_header("date_of_birth"), Some(Field::BirthDate));
    /// assert_eq!(Field::from_header("Colour"), None);
    /// ```
    pub fn from_header(header: &str) -> Option<Field> {
        let key: String = header
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        let field = match key.as_str() {
            "tag" | "tagid" | "eartag" | "tagnumber" | "eartagnumber" => Field::Tag,
            "name" | "cowname" => Field::Name,
            "birthdate" | "dateofbirth" | "dob" | "born" => Field::BirthDate,
            "gender" | "sex" => Field::Gender,
            "breed" => Field::Breed,
            "passport" | "passportnumber" | "passportno" => Field::PassportNumber,
            "status" => Field::Status,
            "dam" | "damtag" | "mother" | "mothertag" => Field::DamTag,
            "sire" | "siretag" | "father" | "fathertag" => Field::SireTag,
            "exitdate" | "dateofexit" => Field::ExitDate,
            "exitreason" => Field::ExitReason,
            "saleprice" | "price" => Field::SalePrice,
            "meatdeliverydate" | "deliverydate" => Field::MeatDeliveryDate,
            "notes" | "comments" | "remarks" => Field::Notes,
            _ => return None,
        };
        Some(field)
    }
}

/// Column index → field for one sheet.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    columns: Vec<Option<Field>>,
}

impl HeaderMap {
    /// Reads the header row. When two columns map to one field the first wins.
    pub fn from_header(header: &[Cell]) -> Self {
        let mut columns: Vec<Option<Field>> = Vec::with_capacity(header.len());
        for cell in header {
            let field = cell_text(cell).and_then(|h| Field::from_header(&h));
            let field = field.filter(|f| !columns.contains(&Some(*f)));
            columns.push(field);
        }
        HeaderMap { columns }
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains(&Some(field))
    }

    fn get<'a>(&self, row: &'a [Cell], field: Field) -> Option<&'a Cell> {
        let index = self.columns.iter().position(|c| *c == Some(field))?;
        row.get(index)
    }
}

// =============================================================================
// Cell Values
// =============================================================================

fn is_sentinel(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || SENTINELS.iter().any(|s| text.eq_ignore_ascii_case(s))
}

/// Text content of a cell, or `None` if it is absent.
pub fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty | Cell::Error => None,
        Cell::Text(s) if is_sentinel(s) => None,
        Cell::Text(s) => Some(s.trim().to_string()),
        Cell::Number(n) if n.is_nan() => None,
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
        Cell::Number(n) => Some(n.to_string()),
        Cell::Bool(b) => Some(b.to_string()),
        Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
    }
}

/// A tag cell. Spreadsheet tools turn `1234` into `1234.0`; undo that.
///
/// ```rust
/// use herd_import::normalize::cell_tag;
/// use herd_import::workbook::Cell;
///
/// assert_eq!(cell_tag(&Cell::Number(1234.0)).as_deref(), Some("1234"));
/// assert_eq!(cell_tag(&Cell::text("1234.0")).as_deref(), Some("1234"));
/// assert_eq!(cell_tag(&Cell::text("PL-7.0")).as_deref(), Some("PL-7.0"));
/// ```
pub fn cell_tag(cell: &Cell) -> Option<String> {
    let text = cell_text(cell)?;
    match text.strip_suffix(".0") {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            Some(digits.to_string())
        }
        _ => Some(text),
    }
}

/// Converts an Excel serial day number (1900 date system).
fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// A date cell. Unparseable text is treated as absent.
pub fn cell_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => excel_serial_date(*n),
        Cell::Text(_) => {
            let text = cell_text(cell)?;
            // "2021-03-04 00:00:00" from text exports
            let date_part = text.split_whitespace().next().unwrap_or(&text);
            let parsed = DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok());
            if parsed.is_none() {
                warn!(value = %text, "Unrecognised date treated as absent");
            }
            parsed
        }
        _ => None,
    }
}

/// A price cell in cents. Unparseable text is treated as absent.
pub fn cell_price(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Number(n) => Money::from_units_f64(*n).map(|m| m.cents()),
        Cell::Text(_) => {
            let text = cell_text(cell)?;
            match Money::parse(&text) {
                Ok(money) => Some(money.cents()),
                Err(e) => {
                    warn!(value = %text, error = %e, "Unrecognised price treated as absent");
                    None
                }
            }
        }
        _ => None,
    }
}

// =============================================================================
// Row
// =============================================================================

/// One normalised register row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    /// 1-based sheet row number.
    pub row: u32,
    pub tag: Option<String>,
    /// Present fields only; never carries an explicit clear.
    pub patch: CowPatch,
    pub dam_tag: Option<String>,
    pub sire_tag: Option<String>,
}

impl ImportRow {
    pub fn parse(headers: &HeaderMap, cells: &[Cell], row: u32) -> Self {
        let cell = |field: Field| headers.get(cells, field);
        let text = |field: Field| cell(field).and_then(cell_text);
        let date = |field: Field| cell(field).and_then(cell_date);
        let tag_of = |field: Field| cell(field).and_then(cell_tag);

        let tag = tag_of(Field::Tag);

        let patch = CowPatch {
            tag: tag.clone(),
            name: text(Field::Name),
            breed: text(Field::Breed),
            birth_date: date(Field::BirthDate).map(Some),
            gender: text(Field::Gender).map(|g| Gender::from_keyword(&g)),
            status: text(Field::Status).map(|s| CowStatus::from_keyword(&s)),
            passport_number: text(Field::PassportNumber).map(Some),
            dam: None,
            sire: None,
            herd: None,
            exit_date: date(Field::ExitDate).map(Some),
            exit_reason: text(Field::ExitReason).map(Some),
            sale_price_cents: cell(Field::SalePrice).and_then(cell_price).map(Some),
            meat_delivery_date: date(Field::MeatDeliveryDate).map(Some),
            notes: text(Field::Notes).map(Some),
        };

        ImportRow {
            row,
            tag,
            patch,
            dam_tag: tag_of(Field::DamTag),
            sire_tag: tag_of(Field::SireTag),
        }
    }
}

/// The herd a sheet belongs to: the first word of its name.
///
/// ```rust
/// use herd_import::normalize::herd_name_from_sheet;
///
/// assert_eq!(herd_name_from_sheet("NORTH Register"), "NORTH");
/// assert_eq!(herd_name_from_sheet("south_2023"), "south");
/// ```
pub fn herd_name_from_sheet(sheet_name: &str) -> String {
    sheet_name
        .split(|c: char| c.is_whitespace() || c == '_')
        .find(|part| !part.is_empty())
        .unwrap_or("Unnamed")
        .to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
