//! The decision pipeline — classifies a message and drafts a reply,
//! consulting the calendar when the model asks for it.
//!
//! Contract: every invocation produces exactly one [`ReplyDecision`], no
//! matter what the model returns. At most one tool round-trip is honored;
//! the second response is final regardless of its content. The pipeline has
//! no side effects of its own beyond the optional calendar query — draft
//! creation and read-marking are the caller's job.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::calendar::{render_schedule, Calendar, CalendarWindow};
use crate::error::PipelineError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, ToolCall, ToolDefinition};
use crate::pipeline::types::{DecisionParse, InboundMessage, ReplyDecision};

/// Name of the single tool advertised to the model.
const CALENDAR_TOOL: &str = "get_calendar_events";

/// Low temperature so classification is stable across retries of the same input.
const TRIAGE_TEMPERATURE: f64 = 0.2;

/// Classification policy. The 11am–5pm Eastern constraint is advisory prompt
/// text relied on by the model's judgment, not validated in code.
const SYSTEM_PROMPT: &str = "\
You are an executive assistant for a professional in their early 20s working in tech. \
Your primary responsibilities are as follows:

1. **Determine if an email requires a response based on these rules:**
   - If the email is from a specific person and sent directly to me, or if the email falls into one of these categories, move to step 2:
       * Direct questions
       * Meeting requests
       * Action items
       * Personal emails
   - If the email falls into one of these categories, do not reply:
       * Newsletters
       * Marketing emails
       * Automated notifications
       * Spam
       * Meeting confirmation emails
       * LinkedIn messages or InMails
       * Emails selling a product or course
   - If the email does not clearly fit into any of the above categories, assume a reply is needed and move to step 2.

2. **Draft a concise, professional reply if a response is needed:**
   - Maintain a friendly but efficient tone.
   - Never use emojis or informal language.
   - Always sign off with: 'Best,\nRahul'.

3. **Output the result as a JSON object with exactly these keys:**
   - `needs_reply`: true/false (true if a reply is needed, false otherwise).
   - `reply_draft`: the draft text if `needs_reply` is true, or an empty string if `needs_reply` is false.

4. **IMPORTANT - Calendar Tool Usage:**
   - If the email is about scheduling a meeting or finding a time to meet, you MUST use the get_calendar_events tool.
   - Do not make assumptions about availability without checking the calendar.
   - When you see words like 'meet', 'schedule', 'calendar', 'availability', or 'time', use the tool.
   - The tool will return your schedule for the next 7 days.
   - Use this information to suggest specific available times between 11am and 5pm EST.";

/// Build the user prompt — sender, subject, body verbatim.
fn build_user_prompt(message: &InboundMessage) -> String {
    format!(
        "Here is the email I receive. From: {}\nSubject: {}\n\n{}",
        message.sender, message.subject, message.body
    )
}

/// The calendar tool as advertised to the model. Declared on every request,
/// whether or not a calendar capability is actually bound.
fn calendar_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: CALENDAR_TOOL.to_string(),
        description: "Get calendar events for the next 7 days to know when is a good time to meet"
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "start_time": {
                    "type": "string",
                    "description": "Start time in ISO format",
                },
                "end_time": {
                    "type": "string",
                    "description": "End time in ISO format",
                },
            },
            "required": ["start_time", "end_time"],
        }),
    }
}

/// A model response, dispatched on the one tool name we know.
///
/// Anything that is not a calendar request — plain content, no tool calls,
/// an unrecognized tool name — is a final answer, so an unexpected tool can
/// never hang the pipeline.
enum ModelTurn {
    Final(String),
    CalendarRequest {
        call: ToolCall,
        /// Content alongside the tool request; the fallback answer when no
        /// calendar capability is bound.
        content: Option<String>,
    },
}

fn classify_turn(response: CompletionResponse) -> ModelTurn {
    let CompletionResponse {
        content,
        tool_calls,
    } = response;

    match tool_calls.into_iter().next() {
        Some(call) if call.function.name == CALENDAR_TOOL => {
            ModelTurn::CalendarRequest { call, content }
        }
        Some(call) => {
            warn!(tool = %call.function.name, "Model requested unknown tool, treating as final");
            ModelTurn::Final(String::new())
        }
        None => ModelTurn::Final(content.unwrap_or_default()),
    }
}

/// The classification-and-drafting pipeline.
pub struct TriagePipeline {
    llm: Arc<dyn LlmProvider>,
    calendar: Option<Arc<dyn Calendar>>,
}

impl TriagePipeline {
    /// `calendar: None` disables tool execution; the tool is still
    /// advertised and a request for it degrades gracefully.
    pub fn new(llm: Arc<dyn LlmProvider>, calendar: Option<Arc<dyn Calendar>>) -> Self {
        Self { llm, calendar }
    }

    /// Classify one message and, if warranted, draft a reply.
    pub async fn decide(&self, message: &InboundMessage) -> Result<ReplyDecision, PipelineError> {
        let system = ChatMessage::system(SYSTEM_PROMPT);
        let user = ChatMessage::user(build_user_prompt(message));

        let request = CompletionRequest::new(vec![system.clone(), user.clone()])
            .with_tools(vec![calendar_tool_definition()])
            .with_temperature(TRIAGE_TEMPERATURE);

        let first = self.llm.complete(request).await.map_err(PipelineError::Llm)?;

        let final_content = match classify_turn(first) {
            ModelTurn::Final(content) => content,
            ModelTurn::CalendarRequest { call, content } => match self.calendar {
                Some(ref calendar) => {
                    self.run_calendar_round_trip(system, user, call, calendar.as_ref())
                        .await?
                }
                None => {
                    warn!(
                        id = %message.id,
                        "Calendar tool requested but no calendar capability bound, \
                         finalizing with the initial response"
                    );
                    content.unwrap_or_default()
                }
            },
        };

        Ok(DecisionParse::from_raw(&final_content).into_decision())
    }

    /// Execute the single honored tool round-trip.
    ///
    /// The window is pinned to now..now+7d UTC regardless of the arguments
    /// the model supplied, for determinism and to bound result size.
    async fn run_calendar_round_trip(
        &self,
        system: ChatMessage,
        user: ChatMessage,
        call: ToolCall,
        calendar: &dyn Calendar,
    ) -> Result<String, PipelineError> {
        debug!(
            requested_args = %call.function.arguments,
            "Calendar tool requested, pinning window to 7-day lookahead"
        );

        let window = CalendarWindow::next_seven_days(Utc::now());
        let events = calendar.list_events(&window).await?;
        info!(count = events.len(), "Fetched calendar events");

        let schedule = render_schedule(&events);
        let call_id = call.id.clone();

        let followup = CompletionRequest::new(vec![
            system,
            user,
            ChatMessage::assistant_tool_calls(vec![call]),
            ChatMessage::tool_result(call_id, schedule),
        ])
        .with_temperature(TRIAGE_TEMPERATURE);

        let second = self.llm.complete(followup).await.map_err(PipelineError::Llm)?;

        // Final regardless of content — a second round of tool requests is
        // not honored.
        Ok(second.content.unwrap_or_default())
    }
}
