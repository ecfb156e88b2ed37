use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument};

use crate::pbis::models::{CollectionDate, WinnerContact};

use super::models::{EmailFailure, EmailMessage, EmailOptions, EmailReport, Winner, WinnerKind};
use super::sender::EmailSender;
use super::templates::{guardian_email, winner_email};

fn has_address(email: &Option<String>) -> bool {
    email.as_deref().is_some_and(|address| !address.trim().is_empty())
}

fn to_winner(contact: &WinnerContact, kind: WinnerKind) -> Winner {
    let level = match kind {
        WinnerKind::Personal => contact.individual_pbis_level,
        WinnerKind::TaTeam => contact.ta_team_pbis_level,
        WinnerKind::Staff | WinnerKind::RandomDrawing => None,
    };
    Winner {
        id: contact.id.clone(),
        name: contact.name.clone(),
        email: contact.email.clone(),
        guardians: contact.parents.clone(),
        kind,
        level,
        ta_teacher: contact.ta_teacher.as_ref().map(|teacher| teacher.name.clone()),
    }
}

/// Winners of every category on a collection who have an email address
pub fn collect_winners(collection: &CollectionDate) -> Vec<Winner> {
    let personal = collection
        .personal_level_winners
        .iter()
        .map(|contact| to_winner(contact, WinnerKind::Personal));
    let teams = collection
        .ta_new_level_winners
        .iter()
        .map(|contact| to_winner(contact, WinnerKind::TaTeam));
    let staff = collection
        .staff_random_winners
        .iter()
        .map(|contact| to_winner(contact, WinnerKind::Staff));
    let drawing = collection
        .random_drawing_winners
        .iter()
        .map(|win| to_winner(&win.student, WinnerKind::RandomDrawing));

    personal
        .chain(teams)
        .chain(staff)
        .chain(drawing)
        .filter(|winner| has_address(&winner.email))
        .collect()
}

/// Winner emails first, then guardian emails when requested
pub fn plan_emails(winners: &[Winner], options: &EmailOptions) -> Vec<EmailMessage> {
    let direct = winners.iter().filter_map(|winner| {
        let to_address = winner.email.clone()?;
        let (subject, body) = winner_email(winner);
        Some(EmailMessage {
            to_address,
            from_address: options.from_address.clone(),
            subject,
            body,
        })
    });

    let guardians = winners
        .iter()
        .filter(|winner| options.email_guardians && winner.kind.is_student())
        .flat_map(|winner| {
            winner
                .guardians
                .iter()
                .filter(|guardian| has_address(&guardian.email))
                .filter_map(move |guardian| {
                    let (subject, body) = guardian_email(winner, guardian)?;
                    Some(EmailMessage {
                        to_address: guardian.email.clone()?,
                        from_address: options.from_address.clone(),
                        subject,
                        body,
                    })
                })
        });

    direct.chain(guardians).collect()
}

/// Sends winner emails one at a time with a pause between sends
pub struct WinnerNotifier {
    sender: Arc<dyn EmailSender>,
    delay: Duration,
}

impl WinnerNotifier {
    pub fn new(sender: Arc<dyn EmailSender>, delay: Duration) -> Self {
        Self { sender, delay }
    }

    #[instrument(skip(self, collection, options), fields(collection_id = %collection.id))]
    pub async fn notify(&self, collection: &CollectionDate, options: &EmailOptions) -> EmailReport {
        let winners = collect_winners(collection);
        let messages = plan_emails(&winners, options);
        self.send_all(&messages).await
    }

    pub async fn send_all(&self, messages: &[EmailMessage]) -> EmailReport {
        let mut report = EmailReport {
            total: messages.len(),
            ..EmailReport::default()
        };

        for (index, message) in messages.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.sender.send(message).await {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    error!(to = %message.to_address, %err, "Error sending winner email");
                    report.failures.push(EmailFailure {
                        to_address: message.to_address.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            total = report.total,
            sent = report.sent,
            failed = report.failures.len(),
            "Winner emails processed"
        );
        report
    }
}
