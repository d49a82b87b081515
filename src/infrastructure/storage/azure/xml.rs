//! Minimal XML field extraction for storage service responses

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static BLOB_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Name>([^<]*)</Name>").unwrap());
static NEXT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<NextMarker>([^<]*)</NextMarker>").unwrap());
static QUEUE_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<QueueMessage>(.*?)</QueueMessage>").unwrap());
static MESSAGE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<MessageId>([^<]*)</MessageId>").unwrap());
static POP_RECEIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<PopReceipt>([^<]*)</PopReceipt>").unwrap());
static MESSAGE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<MessageText>(.*?)</MessageText>").unwrap());
static DEQUEUE_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<DequeueCount>(\d+)</DequeueCount>").unwrap());
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]+|#[xX][0-9a-fA-F]+);").unwrap());

/// Raw fields of one message from a receive response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFields {
    pub id: String,
    pub pop_receipt: String,
    pub text: String,
    pub dequeue_count: u32,
}

/// Blob names and the continuation marker of one listing page
pub fn parse_blob_list(body: &str) -> (Vec<String>, Option<String>) {
    let names = BLOB_NAME
        .captures_iter(body)
        .map(|c| unescape(&c[1]))
        .collect();

    let marker = NEXT_MARKER
        .captures(body)
        .map(|c| unescape(&c[1]))
        .filter(|m| !m.is_empty());

    (names, marker)
}

/// Messages of a receive response; entries missing an id or receipt are dropped
pub fn parse_messages(body: &str) -> Vec<MessageFields> {
    QUEUE_MESSAGE
        .captures_iter(body)
        .filter_map(|block| {
            let block = &block[1];
            let field = |re: &Regex| re.captures(block).map(|c| c[1].to_string());

            Some(MessageFields {
                id: field(&MESSAGE_ID)?,
                pop_receipt: field(&POP_RECEIPT)?,
                text: field(&MESSAGE_TEXT).map(|t| unescape(&t)).unwrap_or_default(),
                dequeue_count: field(&DEQUEUE_COUNT)
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(0),
            })
        })
        .collect()
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Decodes named and numeric character references in one pass
pub fn unescape(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| match decode_entity(&caps[1]) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => entity.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
