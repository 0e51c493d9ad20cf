use serde_json::{json, Value};

use shared_config::AppConfig;

pub struct TestConfig {
    pub api_base_url: String,
    pub hospital_slug: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            hospital_slug: "st-marys".to_string(),
        }
    }
}

impl TestConfig {
    pub fn for_mock_server(uri: &str) -> Self {
        Self {
            api_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig::for_base_url(&self.api_base_url, &self.hospital_slug)
    }
}

pub struct MockHospitalResponses;

impl MockHospitalResponses {
    pub fn question(id: &str) -> Value {
        json!({
            "id": id,
            "question": "How long have you had these symptoms?",
            "question_type": "single_choice",
            "options": ["Less than a day", "1-3 days", "More than 3 days"]
        })
    }

    pub fn start_diagnostic_response(session_id: &str, question_id: Option<&str>) -> Value {
        let mut body = json!({
            "session_id": session_id,
            "message": "Let's understand your symptoms better."
        });

        if let Some(id) = question_id {
            body["current_question"] = Self::question(id);
        }

        body
    }

    pub fn next_question_response(next_step: &str, question_id: &str) -> Value {
        json!({
            "next_step": next_step,
            "message": "Thank you. One more question.",
            "current_question": Self::question(question_id)
        })
    }

    pub fn diagnosis_response(next_step: &str) -> Value {
        json!({
            "next_step": next_step,
            "message": "Based on your answers, this looks like a tension headache.",
            "diagnosis": {
                "condition": "Tension headache",
                "confidence": 0.82,
                "severity": "mild"
            },
            "recommendations": ["Rest in a quiet room", "Stay hydrated"]
        })
    }

    pub fn doctors_response() -> Value {
        json!([
            {
                "id": 11,
                "name": "Dr. Aoife Byrne",
                "specialty": "Neurology",
                "experience_years": 12,
                "rating": 4.8,
                "available_slots": ["09:00", "10:30"]
            },
            {
                "id": 12,
                "name": "Dr. Sean Walsh",
                "specialty": "General Practice",
                "experience_years": 7,
                "rating": 4.5,
                "available_slots": ["14:00"]
            }
        ])
    }

    pub fn tests_response() -> Value {
        json!({
            "recommendations": [
                {
                    "id": 7,
                    "name": "Complete Blood Count",
                    "description": "Checks for infection and anaemia",
                    "price": 25.0,
                    "preparation": "No fasting required"
                },
                {
                    "id": 9,
                    "name": "CT Head Scan",
                    "description": "Imaging to rule out structural causes",
                    "price": 180.0,
                    "preparation": "Remove metal objects"
                }
            ]
        })
    }

    pub fn appointment_response(appointment_id: i64) -> Value {
        json!({
            "appointment_id": appointment_id,
            "message": "Appointment booked successfully",
            "doctor_name": "Dr. Aoife Byrne",
            "status": "confirmed"
        })
    }

    pub fn test_booking_response(booking_id: &str) -> Value {
        json!({
            "booking_id": booking_id,
            "message": "Tests booked successfully",
            "tests_booked": ["Complete Blood Count"],
            "appointment_date": "2026-11-02",
            "appointment_time": "08:30",
            "total_cost": 25.0,
            "preparation_instructions": ["No fasting required"]
        })
    }

    pub fn reschedule_response(appointment_id: i64, new_date: &str, new_time: &str) -> Value {
        json!({
            "id": appointment_id,
            "message": "Appointment rescheduled",
            "doctor_name": "Dr. Aoife Byrne",
            "appointment_date": new_date,
            "appointment_time": new_time,
            "status": "rescheduled"
        })
    }

    pub fn error_detail(detail: &str) -> Value {
        json!({ "detail": detail })
    }
}
