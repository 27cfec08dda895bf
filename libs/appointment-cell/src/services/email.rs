// libs/appointment-cell/src/services/email.rs
use tracing::warn;

use shared_config::AppConfig;
use shared_mailer::{EmailMessage, MailerClient};

use crate::models::Appointment;

/// Booking notification emails, rendered as plain text. Sending is
/// best-effort: failures are logged and never fail the booking flow.
pub struct AppointmentEmailService {
    mailer: MailerClient,
    site_url: String,
}

impl AppointmentEmailService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            mailer: MailerClient::new(config),
            site_url: config.site_url.clone(),
        }
    }

    pub async fn send_reservation_confirmation(
        &self,
        appointment: &Appointment,
        patient_email: &str,
        patient_first_name: &str,
    ) {
        let payment_url = format!("{}/appointments/{}/pay", self.site_url, appointment.id);

        let subject = format!(
            "Appointment Reserved - Dr. {} - {}",
            appointment.doctor_name, appointment.slot_date
        );

        let text = format!(
            "Hello {},\n\n\
             Your appointment has been successfully reserved!\n\n\
             APPOINTMENT DETAILS:\n\
             ===================\n\
             Doctor: Dr. {}\n\
             Specialty: {}\n\
             Date: {}\n\
             Time: {} - {}\n\
             Consultation Fee: {}\n\
             Status: {}\n\n\
             NEXT STEPS:\n\
             ===========\n\
             1. Complete your payment to confirm the appointment\n\
             2. You will receive a confirmation email once payment is processed\n\
             3. Keep this email as your appointment reference\n\n\
             Payment Link: {}\n\n\
             IMPORTANT REMINDERS:\n\
             ===================\n\
             - Please arrive 10 minutes before your scheduled appointment time\n\
             - If you need to cancel or reschedule, contact us at least 24 hours in advance\n\
             - Bring a valid ID and insurance information (if applicable)\n\n\
             If you have any questions, please contact our support team.\n\n\
             Best regards,\n\
             The Medbook Team",
            patient_first_name,
            appointment.doctor_name,
            appointment.specialty_name,
            appointment.slot_date.format("%A, %B %d, %Y"),
            appointment.start_time.format("%I:%M %p"),
            appointment.end_time.format("%I:%M %p"),
            format_fee(appointment.fee_cents),
            appointment.status,
            payment_url,
        );

        self.send(patient_email, subject, text).await;
    }

    pub async fn send_payment_confirmation(
        &self,
        appointment: &Appointment,
        patient_email: &str,
        patient_first_name: &str,
    ) {
        let subject = format!(
            "Payment Confirmed - Appointment with Dr. {}",
            appointment.doctor_name
        );

        let text = format!(
            "Hello {},\n\n\
             Great news! Your payment has been confirmed and your appointment is now confirmed.\n\n\
             APPOINTMENT CONFIRMED:\n\
             =====================\n\
             Doctor: Dr. {}\n\
             Specialty: {}\n\
             Date: {}\n\
             Time: {} - {}\n\
             Amount Paid: {}\n\
             Status: CONFIRMED\n\n\
             Your appointment is now confirmed! Please arrive 10 minutes before your scheduled time.\n\n\
             If you need to cancel or reschedule, please contact us at least 24 hours in advance.\n\n\
             Best regards,\n\
             The Medbook Team",
            patient_first_name,
            appointment.doctor_name,
            appointment.specialty_name,
            appointment.slot_date.format("%A, %B %d, %Y"),
            appointment.start_time.format("%I:%M %p"),
            appointment.end_time.format("%I:%M %p"),
            format_fee(appointment.fee_cents),
        );

        self.send(patient_email, subject, text).await;
    }

    pub async fn send_cancellation_notification(
        &self,
        appointment: &Appointment,
        patient_email: &str,
        patient_first_name: &str,
    ) {
        let subject = format!("Appointment Cancelled - Dr. {}", appointment.doctor_name);

        let text = format!(
            "Hello {},\n\n\
             Your appointment has been cancelled as requested.\n\n\
             CANCELLED APPOINTMENT:\n\
             =====================\n\
             Doctor: Dr. {}\n\
             Specialty: {}\n\
             Date: {}\n\
             Time: {} - {}\n\
             Status: CANCELLED\n\n\
             If you need to book a new appointment, please visit our website or contact us.\n\n\
             Best regards,\n\
             The Medbook Team",
            patient_first_name,
            appointment.doctor_name,
            appointment.specialty_name,
            appointment.slot_date.format("%A, %B %d, %Y"),
            appointment.start_time.format("%I:%M %p"),
            appointment.end_time.format("%I:%M %p"),
        );

        self.send(patient_email, subject, text).await;
    }

    async fn send(&self, to: &str, subject: String, text: String) {
        let message = EmailMessage {
            to: to.to_string(),
            subject,
            text,
        };

        if let Err(e) = self.mailer.send(message).await {
            warn!("Failed to send appointment email to {}: {}", to, e);
        }
    }
}

fn format_fee(fee_cents: i64) -> String {
    format!("${}.{:02}", fee_cents / 100, fee_cents % 100)
}
