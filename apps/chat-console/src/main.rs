use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{parse_date, parse_time, Command, HELP};
use conversation_cell::{
    AppointmentRecord, AppointmentSubmission, ConversationController, ConversationError, Message,
    MessagePayload, RescheduleSubmission, Role, TestBookingSubmission,
};
use session_cell::SessionStore;
use shared_config::AppConfig;
use shared_database::{FileStore, KeyValueStore, MemoryStore};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Logs go to stderr so they don't interleave with the transcript
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting hospital chat console");

    let config = AppConfig::from_env();

    let backend: Arc<dyn KeyValueStore> = match &config.session_store_path {
        Some(path) => {
            info!("Persisting session to {}", path);
            Arc::new(FileStore::open(path)?)
        }
        None => Arc::new(MemoryStore::new()),
    };
    let store = Arc::new(SessionStore::with_namespace(backend, &config.storage_namespace));
    let controller = ConversationController::new(&config, store.clone());

    for message in controller.messages().await {
        print_message(&message);
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = read_line(&mut input, "> ").await? {
        let Some(command) = commands::parse(&line) else {
            continue;
        };

        let outcome = match command {
            Command::Say(text) => controller.send_message(&text).await,
            Command::Doctor(n) => book_doctor(&controller, &mut input, n).await?,
            Command::Tests => book_tests(&controller, &mut input).await?,
            Command::Reschedule(id) => reschedule(&controller, &mut input, id).await?,
            Command::Cancel(id) => controller.cancel_appointment(id).await,
            Command::CancelTests(id) => controller.cancel_test_booking(&id).await,
            Command::Export => {
                println!("{}", serde_json::to_string_pretty(&store.export_session_data())?);
                continue;
            }
            Command::Size => {
                println!("Stored session size: {} characters", store.get_storage_size());
                continue;
            }
            Command::Cleanup(days) => {
                let report = store.cleanup_old_data(days);
                println!(
                    "Removed {} history entries and {} messages",
                    report.patient_history_removed, report.conversation_removed
                );
                continue;
            }
            Command::Clear => {
                controller.clear_chat().await;
                controller.messages().await.iter().for_each(print_message);
                continue;
            }
            Command::Help => {
                println!("{}", HELP);
                continue;
            }
            Command::Quit => break,
            Command::Unknown(raw) => {
                println!("Unknown command {}. Type /help for the list.", raw);
                continue;
            }
        };

        match outcome {
            Ok(appended) => appended.iter().filter(|m| m.role != Role::User).for_each(print_message),
            Err(e) => warn!("{}", e),
        }
    }

    info!("Goodbye");
    Ok(())
}

async fn read_line(input: &mut Input, prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

/// Prompts with a prefilled default; an empty answer keeps it.
async fn ask(input: &mut Input, label: &str, default: &str) -> Result<String> {
    let prompt = if default.is_empty() {
        format!("{}: ", label)
    } else {
        format!("{} [{}]: ", label, default)
    };
    let answer = read_line(input, &prompt).await?.unwrap_or_default();
    let answer = answer.trim();
    Ok(if answer.is_empty() { default.to_string() } else { answer.to_string() })
}

async fn ask_slot(input: &mut Input) -> Result<Option<(chrono::NaiveDate, chrono::NaiveTime)>> {
    let date = parse_date(&ask(input, "Date (YYYY-MM-DD)", "").await?);
    let time = parse_time(&ask(input, "Time (HH:MM)", "").await?);
    match (date, time) {
        (Some(date), Some(time)) => Ok(Some((date, time))),
        _ => {
            println!("That date or time wasn't recognised.");
            Ok(None)
        }
    }
}

fn last_payload<T>(messages: &[Message], pick: impl Fn(&MessagePayload) -> Option<T>) -> Option<T> {
    messages.iter().rev().find_map(|m| m.payload.as_ref().and_then(&pick))
}

async fn book_doctor(
    controller: &ConversationController,
    input: &mut Input,
    n: usize,
) -> Result<Result<Vec<Message>, ConversationError>> {
    let doctors = last_payload(&controller.messages().await, |p| match p {
        MessagePayload::Doctors(doctors) => Some(doctors.clone()),
        _ => None,
    });
    let Some(doctor) = doctors.and_then(|d| d.into_iter().nth(n - 1)) else {
        println!("No doctor number {} in the last list. Ask to book an appointment first.", n);
        return Ok(Ok(Vec::new()));
    };

    let form_message = controller.select_doctor(doctor).await;
    print_message(&form_message);
    let Some(MessagePayload::AppointmentForm(form)) = form_message.payload.as_ref() else {
        return Ok(Ok(Vec::new()));
    };

    let patient_name = ask(input, "Name", &form.patient_name).await?;
    let patient_phone = ask(input, "Phone", &form.patient_phone).await?;
    let patient_email = ask(input, "Email", form.patient_email.as_deref().unwrap_or_default()).await?;
    let Some((appointment_date, appointment_time)) = ask_slot(input).await? else {
        return Ok(Ok(Vec::new()));
    };

    let submission = AppointmentSubmission {
        patient_name,
        patient_phone,
        patient_email: Some(patient_email).filter(|e| !e.is_empty()),
        appointment_date,
        appointment_time,
        symptoms: None,
    };
    Ok(controller.submit_appointment(form_message.id(), submission).await)
}

async fn book_tests(
    controller: &ConversationController,
    input: &mut Input,
) -> Result<Result<Vec<Message>, ConversationError>> {
    let tests = last_payload(&controller.messages().await, |p| match p {
        MessagePayload::Tests(tests) => Some(tests.clone()),
        _ => None,
    });
    let Some(tests) = tests.filter(|t| !t.is_empty()) else {
        println!("No recommended tests yet. Ask to book medical tests first.");
        return Ok(Ok(Vec::new()));
    };

    let form_message = controller.select_tests(tests).await;
    print_message(&form_message);
    let Some(MessagePayload::TestForm(form)) = form_message.payload.as_ref() else {
        return Ok(Ok(Vec::new()));
    };

    let patient_name = ask(input, "Name", &form.patient_name).await?;
    let patient_phone = ask(input, "Phone", &form.patient_phone).await?;
    let Some((preferred_date, preferred_time)) = ask_slot(input).await? else {
        return Ok(Ok(Vec::new()));
    };

    let submission = TestBookingSubmission {
        patient_name,
        patient_phone,
        preferred_date,
        preferred_time,
    };
    Ok(controller.submit_test_booking(form_message.id(), submission).await)
}

async fn reschedule(
    controller: &ConversationController,
    input: &mut Input,
    appointment_id: i64,
) -> Result<Result<Vec<Message>, ConversationError>> {
    let known = last_payload(&controller.messages().await, |p| match p {
        MessagePayload::Appointment(record) if record.id == appointment_id => Some(record.clone()),
        _ => None,
    });
    let appointment = known.unwrap_or_else(|| AppointmentRecord {
        id: appointment_id,
        doctor_name: "your doctor".to_string(),
        patient_name: None,
        appointment_date: None,
        appointment_time: None,
        status: "confirmed".to_string(),
        message: String::new(),
    });

    let form_message = controller.open_reschedule_form(appointment).await;
    print_message(&form_message);
    let Some((new_date, new_time)) = ask_slot(input).await? else {
        return Ok(Ok(Vec::new()));
    };

    let submission = RescheduleSubmission {
        appointment_id: Some(appointment_id),
        new_date,
        new_time,
    };
    Ok(controller.submit_reschedule(form_message.id(), submission).await)
}

fn print_message(message: &Message) {
    println!("\n{}", message.content);

    match &message.payload {
        Some(MessagePayload::Question(pending)) => {
            for (i, option) in pending.question.options.iter().enumerate() {
                println!("  {}. {}", i + 1, option);
            }
        }
        Some(MessagePayload::Diagnosis(result)) => {
            if let Some(severity) = &result.severity {
                println!("  Severity: {}", severity);
            }
            for recommendation in &result.recommendations {
                println!("  - {}", recommendation);
            }
        }
        Some(MessagePayload::Doctors(doctors)) => {
            for (i, doctor) in doctors.iter().enumerate() {
                println!(
                    "  {}. {} ({})",
                    i + 1,
                    doctor.name,
                    doctor.specialty.as_deref().unwrap_or("General")
                );
            }
            println!("  Type /doctor N to book.");
        }
        Some(MessagePayload::Tests(tests)) => {
            for test in tests {
                match test.price {
                    Some(price) => println!("  - {} ({:.2})", test.name, price),
                    None => println!("  - {}", test.name),
                }
            }
            println!("  Type /tests to book them.");
        }
        Some(MessagePayload::Appointment(record)) => {
            println!("  Appointment #{} ({})", record.id, record.status);
        }
        Some(MessagePayload::TestBooking(record)) => {
            println!("  Booking {}", record.booking_id);
            for instruction in &record.preparation_instructions {
                println!("  - {}", instruction);
            }
        }
        _ => {}
    }
}
