use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

/// WGS-84 point, degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    #[schema(example = 37.5)]
    pub latitude: f64,
    #[schema(example = 127.0)]
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RefreshPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RefreshPeriod {
    pub fn validity_days(self) -> u64 {
        match self {
            RefreshPeriod::Daily => 1,
            RefreshPeriod::Weekly => 7,
            RefreshPeriod::Monthly => 30,
            RefreshPeriod::Yearly => 365,
        }
    }

    /// Last day (inclusive) a code generated on `from` stays valid.
    pub fn valid_until(self, from: NaiveDate) -> NaiveDate {
        from.checked_add_days(Days::new(self.validity_days()))
            .unwrap_or(NaiveDate::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QrCode {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 10)]
    pub clinic_id: u64,
    #[schema(example = "6f1c2d7e-9b3a-4c8e-a1f0-2d4b6c8e0a12")]
    pub code: String,
    pub anchor: Option<Coordinates>,
    #[schema(example = 100)]
    pub radius_meters: u32,
    pub refresh_period: RefreshPeriod,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub valid_date: NaiveDate,
    #[schema(example = "2026-03-09", format = "date", value_type = String)]
    pub valid_until: NaiveDate,
    #[schema(example = "2026-03-02T08:00:00", format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    pub active: bool,
}

impl QrCode {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_date <= date && date <= self.valid_until
    }
}

/// Values for a code that is about to replace the clinic's active one.
#[derive(Debug, Clone)]
pub struct NewQrCode {
    pub clinic_id: u64,
    pub code: String,
    pub anchor: Option<Coordinates>,
    pub radius_meters: u32,
    pub refresh_period: RefreshPeriod,
    pub valid_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct QrCodeRow {
    pub id: u64,
    pub clinic_id: u64,
    pub code: String,
    pub anchor_latitude: Option<f64>,
    pub anchor_longitude: Option<f64>,
    pub radius_meters: u32,
    pub refresh_period: String,
    pub valid_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub created_at: NaiveDateTime,
    pub is_active: bool,
}

impl TryFrom<QrCodeRow> for QrCode {
    type Error = strum::ParseError;

    fn try_from(row: QrCodeRow) -> Result<Self, Self::Error> {
        let anchor = match (row.anchor_latitude, row.anchor_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        };

        Ok(QrCode {
            id: row.id,
            clinic_id: row.clinic_id,
            code: row.code,
            anchor,
            radius_meters: row.radius_meters,
            refresh_period: row.refresh_period.parse()?,
            valid_date: row.valid_date,
            valid_until: row.valid_until,
            created_at: row.created_at,
            active: row.is_active,
        })
    }
}
