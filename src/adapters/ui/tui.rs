//! Implements InputPort. Inquire-based terminal dashboard.
//!
//! Contacts table, "refresh all" with a spinner, per-contact recordings and summary notes.
//! Fetched conversations are kept per contact for the rest of the session.

use crate::domain::{
    Contact, DomainError, EnrichedConversation, RecordingStatus, RecordingTally,
};
use crate::ports::InputPort;
use crate::usecases::{NoteService, RecordingsService};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::ui::{Color, RenderConfig, Styled};
use inquire::{Confirm, InquireError, Select};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

const TABLE_HEADERS: [&str; 6] = [
    "Contact ID",
    "First Name",
    "Last Name",
    "Phone",
    "Email",
    "Recordings",
];

/// Applies the prompt theme for all subsequent inquire prompts.
pub fn apply_theme() {
    let config = RenderConfig::default()
        .with_prompt_prefix(Styled::new("▶").with_fg(Color::LightCyan))
        .with_highlighted_option_prefix(Styled::new("›").with_fg(Color::LightYellow));
    inquire::set_global_render_config(config);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    ShowContacts,
    RefreshAll,
    FetchContact,
    CreateNote,
    Exit,
}

impl MenuItem {
    const ALL: [MenuItem; 5] = [
        MenuItem::ShowContacts,
        MenuItem::RefreshAll,
        MenuItem::FetchContact,
        MenuItem::CreateNote,
        MenuItem::Exit,
    ];
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::ShowContacts => "Show contacts",
            MenuItem::RefreshAll => "Refresh all recordings",
            MenuItem::FetchContact => "Fetch recordings for a contact",
            MenuItem::CreateNote => "Create summary note",
            MenuItem::Exit => "Exit",
        };
        f.write_str(label)
    }
}

struct ContactChoice(Contact);

impl fmt::Display for ContactChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let contact = &self.0;
        let non_empty = |value: &Option<String>| value.clone().filter(|s| !s.is_empty());
        let detail = non_empty(&contact.email)
            .or_else(|| non_empty(&contact.phone))
            .unwrap_or_else(|| contact.contact_id.clone());
        write!(f, "{} <{}>", contact.display_name(), detail)
    }
}

/// Map a cancelled prompt (Esc / Ctrl-C) to `None`.
fn optional<T>(result: Result<T, InquireError>) -> Result<Option<T>, DomainError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(DomainError::Ui(e.to_string())),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Render contacts as an aligned text table. The recordings column shows `-` until fetched.
pub fn render_table(contacts: &[Contact], tallies: &HashMap<String, RecordingTally>) -> String {
    let cell = |value: &Option<String>| value.clone().unwrap_or_default();
    let rows: Vec<[String; 6]> = contacts
        .iter()
        .map(|c| {
            [
                c.contact_id.clone(),
                cell(&c.first_name),
                cell(&c.last_name),
                cell(&c.phone),
                cell(&c.email),
                tallies
                    .get(&c.contact_id)
                    .map(|t| t.recordings.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &TABLE_HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", value, width = *width))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Render the call messages of each conversation with their recording outcome.
pub fn render_recordings(conversations: &[EnrichedConversation]) -> String {
    if conversations.is_empty() {
        return "No conversations.\n".to_string();
    }
    let mut out = String::new();
    for conversation in conversations {
        out.push_str(&format!("Conversation {}\n", conversation.conversation.id));
        let mut calls = 0;
        for message in &conversation.messages {
            let Some(call) = &message.call else {
                continue;
            };
            calls += 1;
            let line = match (&call.recording, call.recording_status) {
                (Some(link), _) => format!(
                    "  Recording: {} {} (expires {})",
                    link.filename,
                    link.recording_url,
                    link.expires_at.format("%H:%M:%S UTC")
                ),
                (None, RecordingStatus::Failed) => format!(
                    "  Call {}: recording unavailable ({})",
                    message.message.id,
                    call.recording_error.as_deref().unwrap_or("unknown error")
                ),
                (None, _) => format!("  Call {}: no recording", message.message.id),
            };
            out.push_str(&line);
            out.push('\n');
        }
        if calls == 0 {
            out.push_str("  (no calls)\n");
        }
    }
    out
}

/// TUI adapter. Inquire prompts.
pub struct TuiDashboard {
    recordings: Arc<RecordingsService>,
    notes: Arc<NoteService>,
    location_id: Option<String>,
    conversations: RwLock<HashMap<String, Vec<EnrichedConversation>>>,
}

impl TuiDashboard {
    pub fn new(
        recordings: Arc<RecordingsService>,
        notes: Arc<NoteService>,
        location_id: Option<String>,
    ) -> Self {
        Self {
            recordings,
            notes,
            location_id,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    fn location(&self) -> Option<&str> {
        self.location_id.as_deref()
    }

    async fn tallies(&self) -> HashMap<String, RecordingTally> {
        self.conversations
            .read()
            .await
            .iter()
            .map(|(id, conversations)| (id.clone(), RecordingTally::of(conversations)))
            .collect()
    }

    async fn show_contacts(&self) -> Result<(), DomainError> {
        let contacts = self.recordings.list_contacts(self.location()).await?;
        let tallies = self.tallies().await;
        println!("{}", render_table(&contacts, &tallies));
        Ok(())
    }

    async fn refresh_all(&self) -> Result<(), DomainError> {
        let pb = spinner("Fetching all recordings...");
        let all = match self.recordings.fetch_all_recordings(self.location()).await {
            Ok(all) => all,
            Err(e) => {
                pb.abandon_with_message("Fetching all recordings failed");
                return Err(e);
            }
        };

        let contacts = all.len();
        let mut recordings = 0;
        let mut cache = self.conversations.write().await;
        for entry in all.into_values() {
            recordings += RecordingTally::of(&entry.conversations).recordings;
            cache.insert(entry.contact.contact_id, entry.conversations);
        }
        pb.finish_with_message(format!(
            "{} contact(s), {} recording(s)",
            contacts, recordings
        ));
        Ok(())
    }

    async fn pick_contact(&self) -> Result<Option<Contact>, DomainError> {
        let contacts = self.recordings.list_contacts(self.location()).await?;
        if contacts.is_empty() {
            println!("No contacts in this location.");
            return Ok(None);
        }
        let choices: Vec<ContactChoice> = contacts.into_iter().map(ContactChoice).collect();
        Ok(optional(Select::new("Contact", choices).prompt())?.map(|choice| choice.0))
    }

    async fn load_contact(&self, contact: &Contact) -> Result<Vec<EnrichedConversation>, DomainError> {
        let pb = spinner(&format!("Fetching recordings for {}...", contact.display_name()));
        let lookup = self
            .recordings
            .fetch_recordings_for_contact(
                &contact.contact_id,
                contact.email.as_deref(),
                self.location(),
            )
            .await;
        pb.finish_and_clear();
        let conversations = lookup?.conversations;
        self.conversations
            .write()
            .await
            .insert(contact.contact_id.clone(), conversations.clone());
        Ok(conversations)
    }

    async fn fetch_contact(&self) -> Result<(), DomainError> {
        let Some(contact) = self.pick_contact().await? else {
            return Ok(());
        };
        let conversations = self.load_contact(&contact).await?;
        print!("{}", render_recordings(&conversations));
        Ok(())
    }

    async fn create_note(&self) -> Result<(), DomainError> {
        let Some(contact) = self.pick_contact().await? else {
            return Ok(());
        };
        let cached = self
            .conversations
            .read()
            .await
            .get(&contact.contact_id)
            .cloned();
        let conversations = match cached {
            Some(conversations) => conversations,
            None => self.load_contact(&contact).await?,
        };
        if conversations.is_empty() {
            println!("No conversations for {}; nothing to summarise.", contact.display_name());
            return Ok(());
        }

        let text = NoteService::summary_text(&contact, &conversations);
        println!("{}", text);
        let confirmed = optional(
            Confirm::new("Create this note on the contact?")
                .with_default(true)
                .prompt(),
        )?
        .unwrap_or(false);
        if !confirmed {
            return Ok(());
        }

        self.notes.create_note(&contact.contact_id, &text).await?;
        println!("Summary successfully created as a note");
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiDashboard {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let Some(choice) = optional(Select::new("Dashboard", MenuItem::ALL.to_vec()).prompt())?
            else {
                break;
            };
            let outcome = match choice {
                MenuItem::ShowContacts => self.show_contacts().await,
                MenuItem::RefreshAll => self.refresh_all().await,
                MenuItem::FetchContact => self.fetch_contact().await,
                MenuItem::CreateNote => self.create_note().await,
                MenuItem::Exit => break,
            };
            if let Err(e) = outcome {
                warn!(action = %choice, error = %e, "dashboard action failed");
                println!("Error: {}", e);
            }
        }
        Ok(())
    }
}
