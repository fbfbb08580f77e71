use chrono::{Local, TimeZone};
use serde::Serialize;
use serde_json::Value;

const MISSING: &str = "N/A";
const CUSTOMER_INFO: &str = "CUSTOMER_INFO";
const CONSUMER: &str = "Consumer";
const OVERDUE: &str = "OVERDUE";

/// One CSV line per conversation whose last message came from the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedRow {
    #[serde(rename = "Conversation ID")]
    pub conversation_id: String,
    #[serde(rename = "Start Time")]
    pub start_time: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Duration")]
    pub duration: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Last Skill")]
    pub skill_id: String,
    #[serde(rename = "Last Skill Name")]
    pub skill_name: String,
    #[serde(rename = "Latest Agent Full Name")]
    pub agent_name: String,
    #[serde(rename = "Company Branch")]
    pub branch: String,
    #[serde(rename = "IMEI")]
    pub imei: String,
    #[serde(rename = "Last Delivery Status")]
    pub last_delivery_status: String,
}

impl ProcessedRow {
    pub fn is_overdue(&self) -> bool {
        self.status == OVERDUE
    }
}

/// Renders a JSON value the way it should appear in a CSV cell.
fn cell(value: Option<&Value>) -> String {
    match value {
        None => MISSING.to_owned(),
        Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_date<Tz>(millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    tz.timestamp_millis_opt(millis)
        .single()
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| MISSING.to_owned())
}

fn start_millis(info: &Value) -> i64 {
    match info.get("startTimeL") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Branch and IMEI from the last `CUSTOMER_INFO` structured data event.
fn customer_info(conversation: &Value) -> (String, String) {
    let mut branch = MISSING.to_owned();
    let mut imei = MISSING.to_owned();

    let events = conversation
        .pointer("/sdes/events")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for event in events
        .iter()
        .filter(|event| event.get("sdeType").and_then(Value::as_str) == Some(CUSTOMER_INFO))
    {
        let details = event.pointer("/customerInfo/customerInfo");
        branch = cell(details.and_then(|d| d.get("companyBranch")));
        imei = cell(details.and_then(|d| d.get("imei")));
    }

    (branch, imei)
}

/// Shapes a single raw conversation. Returns `None` unless the last
/// message status belongs to a `Consumer`.
pub fn shape<Tz>(conversation: &Value, tz: &Tz) -> Option<ProcessedRow>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let last_message = conversation
        .get("messageStatuses")
        .and_then(Value::as_array)
        .and_then(|statuses| statuses.last());

    let participant = last_message
        .and_then(|m| m.get("participantType"))
        .and_then(Value::as_str);
    if participant != Some(CONSUMER) {
        return None;
    }

    let info = conversation.get("info").unwrap_or(&Value::Null);
    let field = |key: &str| cell(info.get(key));
    let (branch, imei) = customer_info(conversation);

    Some(ProcessedRow {
        conversation_id: field("conversationId"),
        start_time: field("startTime"),
        date: format_date(start_millis(info), tz),
        duration: field("duration"),
        status: field("status"),
        skill_id: field("latestSkillId"),
        skill_name: field("latestSkillName"),
        agent_name: field("latestAgentFullName"),
        branch,
        imei,
        last_delivery_status: cell(last_message.and_then(|m| m.get("messageDeliveryStatus"))),
    })
}

/// Shapes one page of conversations, returning the kept rows and how many
/// of them are overdue.
pub fn process_conversations(conversations: &[Value]) -> (Vec<ProcessedRow>, usize) {
    process_conversations_in(conversations, &Local)
}

pub fn process_conversations_in<Tz>(conversations: &[Value], tz: &Tz) -> (Vec<ProcessedRow>, usize)
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let rows: Vec<ProcessedRow> = conversations
        .iter()
        .filter_map(|conversation| shape(conversation, tz))
        .collect();
    let overdue = rows.iter().filter(|row| row.is_overdue()).count();

    (rows, overdue)
}
