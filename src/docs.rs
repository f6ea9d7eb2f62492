use crate::api::attendance::{DayStatusBody, ScanBody};
use crate::api::qr_code::GenerateQrBody;
use crate::api::schedule::ScheduleBody;
use crate::api::statistics::RecomputeBody;
use crate::model::attendance::{AttendancePhase, AttendanceRecord, AttendanceStatus, TodayAttendance};
use crate::model::qr_code::{Coordinates, QrCode, RefreshPeriod};
use crate::model::schedule::{Schedule, ScheduleScope, ShiftWindow, UserSchedule};
use crate::model::statistics::MonthlyStatistics;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clinic Attendance API",
        version = "1.0.0",
        description = r#"
## Clinic Attendance

Staff attendance for multi-clinic operations, driven by geofenced, time-windowed QR codes.

### 🔹 Key Features
- **QR Codes**
  - Generate a clinic's code (daily, weekly, monthly or yearly window) and show today's code
- **Attendance**
  - Check in and check out by scanning, with optional geofencing
  - Late, early-leave and overtime minutes against the resolved schedule
  - History and manager-set absence / leave / holiday days
- **Schedules**
  - Weekly entries and date overrides, per user or clinic-wide
- **Statistics**
  - Monthly per-user rollups with attendance rate

### 🔐 Security
All endpoints require a **JWT Bearer** access token carrying the caller's clinic.
Generating QR codes, editing schedules and marking days need **Manager** or **Admin**.

### 📦 Response Format
`{ "success": true, "data": ... }` or `{ "success": false, "error": { "kind", "message" } }`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::qr_code::generate,
        crate::api::qr_code::today,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::records,
        crate::api::attendance::day_status,

        crate::api::statistics::recompute,
        crate::api::statistics::get_statistics,

        crate::api::schedule::set_schedule,
        crate::api::schedule::list_schedules
    ),
    components(
        schemas(
            GenerateQrBody,
            Coordinates,
            RefreshPeriod,
            QrCode,
            ScanBody,
            DayStatusBody,
            AttendanceStatus,
            AttendancePhase,
            AttendanceRecord,
            TodayAttendance,
            RecomputeBody,
            MonthlyStatistics,
            ScheduleBody,
            ScheduleScope,
            Schedule,
            ShiftWindow,
            UserSchedule
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "QR Code", description = "Clinic QR code lifecycle"),
        (name = "Attendance", description = "Check-in / check-out and history"),
        (name = "Statistics", description = "Monthly attendance statistics"),
        (name = "Schedule", description = "Work schedules"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
