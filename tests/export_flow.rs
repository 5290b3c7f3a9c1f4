//! End-to-end export flow through the public API, with in-memory
//! Gmail and Sheets backends.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use google_gmail1::api::{Message, MessagePart, MessagePartBody, MessagePartHeader};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use gmail_to_sheets::{
    MailClient, MessageFilter, Pipeline, ProcessedState, Result, SheetWriter, SheetsApi,
};

fn make_message(id: &str, from: &str, subject: &str, body: &str) -> Message {
    Message {
        id: Some(id.to_string()),
        payload: Some(MessagePart {
            mime_type: Some("text/plain".to_string()),
            headers: Some(vec![
                MessagePartHeader {
                    name: Some("From".to_string()),
                    value: Some(from.to_string()),
                },
                MessagePartHeader {
                    name: Some("Subject".to_string()),
                    value: Some(subject.to_string()),
                },
                MessagePartHeader {
                    name: Some("Date".to_string()),
                    value: Some("Thu, 02 May 2024 08:15:00 +0000".to_string()),
                },
            ]),
            body: Some(MessagePartBody {
                data: Some(URL_SAFE_NO_PAD.encode(body.as_bytes()).into_bytes()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// In-memory mailbox that tracks read status
struct FakeMailbox {
    messages: Mutex<Vec<(String, Message, bool)>>,
}

impl FakeMailbox {
    fn new(messages: Vec<(String, Message)>) -> Self {
        Self {
            messages: Mutex::new(
                messages
                    .into_iter()
                    .map(|(id, m)| (id, m, false))
                    .collect(),
            ),
        }
    }

    fn unread_count(&self) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, read)| !read)
            .count()
    }
}

#[async_trait]
impl MailClient for FakeMailbox {
    async fn list_unread_message_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, read)| !read)
            .map(|(id, _, _)| id.clone())
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|(mid, _, _)| mid == id)
            .map(|(_, m, _)| m.clone())
            .expect("unknown message id"))
    }

    async fn mark_read(&self, message_ids: &[String]) -> Result<usize> {
        let mut messages = self.messages.lock().unwrap();
        let mut count = 0;
        for (id, _, read) in messages.iter_mut() {
            if message_ids.contains(id) {
                *read = true;
                count += 1;
            }
        }
        Ok(count)
    }
}

/// In-memory spreadsheet tab
#[derive(Default)]
struct FakeSheet {
    rows: Mutex<Vec<Vec<String>>>,
    header: Mutex<Option<Vec<String>>>,
}

#[async_trait]
impl SheetsApi for FakeSheet {
    async fn ensure_sheet_exists(&self, _sheet_name: &str) -> Result<()> {
        Ok(())
    }

    async fn read_header_row(&self, _sheet_name: &str) -> Result<Option<Vec<String>>> {
        Ok(self.header.lock().unwrap().clone())
    }

    async fn write_header_row(&self, _sheet_name: &str, headers: &[String]) -> Result<()> {
        *self.header.lock().unwrap() = Some(headers.to_vec());
        Ok(())
    }

    async fn append_rows(&self, _sheet_name: &str, rows: &[Vec<String>]) -> Result<()> {
        self.rows.lock().unwrap().extend(rows.iter().cloned());
        Ok(())
    }
}

#[tokio::test]
async fn exports_unread_messages_and_marks_them_read() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");

    let mailbox = Arc::new(FakeMailbox::new(vec![
        (
            "a1".to_string(),
            make_message("a1", "alice@example.com", "Invoice 42", "Please pay"),
        ),
        (
            "b2".to_string(),
            make_message("b2", "bob@example.com", "Lunch?", "Noon works"),
        ),
    ]));
    let sheet = Arc::new(FakeSheet::default());

    let writer = SheetWriter::new(Box::new(sheet.clone()), "Emails".to_string(), 50);
    let pipeline = Pipeline::new(
        mailbox.clone(),
        writer,
        MessageFilter::default(),
        state_path.clone(),
        10_000,
    );

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.appended, 2);
    assert_eq!(summary.marked_read, 2);
    assert_eq!(mailbox.unread_count(), 0);

    // Header written once, then data rows in listing order
    let header = sheet.header.lock().unwrap().clone().unwrap();
    assert_eq!(header, vec!["From", "Subject", "Date", "Content"]);
    let rows = sheet.rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], vec![
        "alice@example.com",
        "Invoice 42",
        "2024-05-02T08:15:00+00:00",
        "Please pay",
    ]);

    // Ledger on disk matches what was exported
    let state = ProcessedState::load(&state_path).await.unwrap();
    assert!(state.contains("a1"));
    assert!(state.contains("b2"));
}

#[tokio::test]
async fn rerun_after_new_mail_only_exports_the_new_message() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");

    let mailbox = Arc::new(FakeMailbox::new(vec![(
        "a1".to_string(),
        make_message("a1", "alice@example.com", "First", "one"),
    )]));
    let sheet = Arc::new(FakeSheet::default());

    let writer = SheetWriter::new(Box::new(sheet.clone()), "Emails".to_string(), 50);
    let pipeline = Pipeline::new(
        mailbox.clone(),
        writer,
        MessageFilter::default(),
        state_path.clone(),
        10_000,
    );
    pipeline.run().await.unwrap();

    // New mail arrives between runs
    mailbox.messages.lock().unwrap().push((
        "c3".to_string(),
        make_message("c3", "carol@example.com", "Second", "two"),
        false,
    ));

    let writer = SheetWriter::new(Box::new(sheet.clone()), "Emails".to_string(), 50);
    let pipeline = Pipeline::new(
        mailbox.clone(),
        writer,
        MessageFilter::default(),
        state_path,
        10_000,
    );
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.appended, 1);
    let rows = sheet.rows.lock().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1], "Second");
}
