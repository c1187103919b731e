//! System framing sent as the first turn of every query.

use crate::ToolDef;
use chrono::NaiveDate;

/// Context key holding the end user's identity.
pub const USER_KEY: &str = "email";

/// Shown when the context carries no user identity.
pub const DEFAULT_USER: &str = "User";

/// Builds the system framing for one query.
///
/// ```ignore
/// let framing = SystemFraming::new("Aterges AI", reference_date)
///     .with_user(context.get("email").map(String::as_str))
///     .with_tools(&tools)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct SystemFraming<'a> {
    assistant_name: &'a str,
    user: &'a str,
    reference_date: NaiveDate,
    tools: &'a [ToolDef],
}

impl<'a> SystemFraming<'a> {
    pub fn new(assistant_name: &'a str, reference_date: NaiveDate) -> Self {
        Self {
            assistant_name,
            user: DEFAULT_USER,
            reference_date,
            tools: &[],
        }
    }

    /// Set the end user. Blank or missing identities fall back to "User".
    pub fn with_user(mut self, user: Option<&'a str>) -> Self {
        self.user = user
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_USER);
        self
    }

    pub fn with_tools(mut self, tools: &'a [ToolDef]) -> Self {
        self.tools = tools;
        self
    }

    pub fn build(&self) -> String {
        let mut out = format!(
            "You are {}, an assistant specializing in marketing analytics and business \
             intelligence.\n\n\
             User Context:\n\
             - User: {}\n\
             - Today's date: {}\n\n",
            self.assistant_name,
            self.user,
            self.reference_date.format(crate::dates::DATE_FORMAT),
        );

        if self.tools.is_empty() {
            out.push_str(
                "No live data sources are available right now. Answer from general \
                 knowledge, say clearly that you could not look up the user's data, and \
                 suggest checking the data source configuration.\n",
            );
            return out;
        }

        out.push_str("Available Function Tools:\n");
        for tool in self.tools {
            out.push_str(&format!(
                "- {}: {}\n",
                tool.name(),
                tool.function.description
            ));
        }
        out.push_str(
            "\nFunction calling rules:\n\
             - When you need data, ONLY use the provided function tools.\n\
             - Do not write or execute code.\n\
             - Pass dates in YYYY-MM-DD format, computed relative to today's date.\n\
             - Work out an appropriate date range from the user's question; \
             \"yesterday\" is a single day.\n\
             - If a call fails, explain why and suggest alternatives.\n\n\
             Answer clearly and concisely, with specific numbers from the data and \
             actionable recommendations when relevant.\n",
        );
        out
    }
}
