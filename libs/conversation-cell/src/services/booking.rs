use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::HospitalApiClient;
use shared_models::AppError;
use shared_utils::{generate_id, generate_numeric_id};

use crate::models::{
    AppointmentRecord, AppointmentRequest, TestBookingRecord, TestBookingRequest,
};

pub const UNKNOWN_DOCTOR: &str = "Unknown Doctor";
pub const DEFAULT_STATUS: &str = "confirmed";

fn field_str(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match body.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn field_i64(body: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match body.get(*key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn field_strings(body: &Value, key: &str) -> Option<Vec<String>> {
    match body.get(key)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(_) => field_str(item, &["name", "test_name"]),
                    _ => None,
                })
                .collect(),
        ),
        Value::String(s) => Some(vec![s.clone()]),
        _ => None,
    }
}

/// Appointment ids must be present and positive before any call is made.
pub fn validate_appointment_id(appointment_id: Option<i64>) -> Result<i64, AppError> {
    match appointment_id {
        Some(id) if id > 0 => Ok(id),
        other => Err(AppError::ValidationError(format!(
            "invalid appointment id: {}",
            other.map(|id| id.to_string()).unwrap_or_else(|| "missing".to_string())
        ))),
    }
}

pub fn validate_booking_id(booking_id: &str) -> Result<&str, AppError> {
    let trimmed = booking_id.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return Err(AppError::ValidationError("invalid test booking id".to_string()));
    }
    Ok(trimmed)
}

pub struct BookingService {
    api: HospitalApiClient,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: HospitalApiClient::new(config),
        }
    }

    pub async fn book_appointment(&self, request: &AppointmentRequest) -> Result<AppointmentRecord, AppError> {
        debug!("Booking appointment with {}", request.doctor_name);

        let url = self.api.hospital_url("/book-appointment");
        let body: Value = self.api.post(&url, &[], Some(serde_json::to_value(request)?)).await?;

        let record = AppointmentRecord {
            id: field_i64(&body, &["id", "appointment_id"]).unwrap_or_else(generate_numeric_id),
            doctor_name: field_str(&body, &["doctor_name", "doctor"])
                .unwrap_or_else(|| UNKNOWN_DOCTOR.to_string()),
            patient_name: field_str(&body, &["patient_name"]).or_else(|| Some(request.patient_name.clone())),
            appointment_date: field_str(&body, &["appointment_date", "date"])
                .or_else(|| Some(request.appointment_date.clone())),
            appointment_time: field_str(&body, &["appointment_time", "time"])
                .or_else(|| Some(request.appointment_time.clone())),
            status: field_str(&body, &["status"]).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            message: field_str(&body, &["message"])
                .unwrap_or_else(|| "Appointment booked successfully".to_string()),
        };

        info!("Appointment {} booked ({})", record.id, record.status);
        Ok(record)
    }

    pub async fn book_tests(
        &self,
        request: &TestBookingRequest,
        expected_cost: Option<f64>,
    ) -> Result<TestBookingRecord, AppError> {
        debug!("Booking {} tests", request.test_names.len());

        let url = self.api.hospital_url("/book-tests");
        let body: Value = self.api.post(&url, &[], Some(serde_json::to_value(request)?)).await?;

        let record = TestBookingRecord {
            booking_id: field_str(&body, &["booking_id", "id"]).unwrap_or_else(|| generate_id("booking")),
            message: field_str(&body, &["message"]).unwrap_or_else(|| "Tests booked successfully".to_string()),
            tests_booked: field_strings(&body, "tests_booked").unwrap_or_else(|| request.test_names.clone()),
            appointment_date: field_str(&body, &["appointment_date"]).or_else(|| Some(request.preferred_date.clone())),
            appointment_time: field_str(&body, &["appointment_time"]).or_else(|| Some(request.preferred_time.clone())),
            total_cost: body.get("total_cost").and_then(Value::as_f64).or(expected_cost),
            preparation_instructions: field_strings(&body, "preparation_instructions").unwrap_or_default(),
        };

        info!("Test booking {} confirmed", record.booking_id);
        Ok(record)
    }

    /// `previous` supplies any fields the server leaves out of its reply.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: i64,
        new_date: NaiveDate,
        new_time: NaiveTime,
        previous: Option<&AppointmentRecord>,
    ) -> Result<AppointmentRecord, AppError> {
        debug!("Rescheduling appointment {}", appointment_id);

        let new_date = new_date.format("%Y-%m-%d").to_string();
        let new_time = new_time.format("%H:%M").to_string();

        let url = self.api.legacy_url("/reschedule-appointment");
        let body: Value = self
            .api
            .put(
                &url,
                json!({
                    "appointment_id": appointment_id,
                    "new_date": new_date,
                    "new_time": new_time
                }),
            )
            .await?;

        let record = AppointmentRecord {
            id: field_i64(&body, &["id", "appointment_id"]).unwrap_or(appointment_id),
            doctor_name: field_str(&body, &["doctor_name", "doctor"])
                .or_else(|| previous.map(|p| p.doctor_name.clone()))
                .unwrap_or_else(|| UNKNOWN_DOCTOR.to_string()),
            patient_name: field_str(&body, &["patient_name"]).or_else(|| previous.and_then(|p| p.patient_name.clone())),
            appointment_date: field_str(&body, &["appointment_date", "new_date"]).or(Some(new_date)),
            appointment_time: field_str(&body, &["appointment_time", "new_time"]).or(Some(new_time)),
            status: field_str(&body, &["status"]).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            message: field_str(&body, &["message"])
                .unwrap_or_else(|| "Appointment rescheduled successfully".to_string()),
        };

        info!("Appointment {} rescheduled", record.id);
        Ok(record)
    }

    pub async fn cancel_appointment(&self, appointment_id: i64) -> Result<String, AppError> {
        debug!("Cancelling appointment {}", appointment_id);

        let url = self.api.hospital_url(&format!("/cancel-appointment/{}", appointment_id));
        let body: Value = self.api.delete(&url).await?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(field_str(&body, &["message"]).unwrap_or_else(|| "Appointment cancelled successfully".to_string()))
    }

    pub async fn cancel_test_booking(&self, booking_id: &str) -> Result<String, AppError> {
        debug!("Cancelling test booking {}", booking_id);

        let url = self.api.base_url(&format!(
            "/tests/cancel/{}",
            HospitalApiClient::encode_segment(booking_id)
        ));
        let body: Value = self.api.delete(&url).await?;

        info!("Test booking {} cancelled", booking_id);
        Ok(field_str(&body, &["message"]).unwrap_or_else(|| "Test booking cancelled successfully".to_string()))
    }
}
