// Test doubles shared by the unit tests.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::errors::{AppError, Result};
use crate::services::mail_service::{MailSender, MessageId};
use crate::services::otp_service::{generate_otp, Clock, CodeGenerator};

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub message_id: MessageId,
}

impl SentMail {
    // Code sits in the only <strong> element of the template
    pub fn extract_code(&self) -> Option<String> {
        let start = self.html_body.find("<strong>")? + "<strong>".len();
        let end = self.html_body[start..].find("</strong>")? + start;
        Some(self.html_body[start..end].to_string())
    }
}

#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail_next: AtomicBool,
}

impl CapturingMailer {
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn last(&self) -> Option<SentMail> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailSender for CapturingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<MessageId> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::delivery("connection refused"));
        }

        let mut sent = self.sent.lock().unwrap();
        let message_id = MessageId(format!("<test-{}@capture.local>", sent.len() + 1));
        sent.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
            message_id: message_id.clone(),
        });
        Ok(message_id)
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Hands out the given codes in order, then falls back to random ones.
pub struct SequenceGenerator {
    codes: Mutex<VecDeque<String>>,
}

impl SequenceGenerator {
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
        }
    }

    pub fn into_generator(self) -> CodeGenerator {
        let this = Arc::new(self);
        Arc::new(move || {
            this.codes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(generate_otp)
        })
    }
}
