// Markdown rendering of a finished pick log and the document built from it.

use serde_json::json;

use crate::db::NewMockDraft;
use crate::draft::pick::{round_of_pick_number, PickRecord};
use crate::protocol::TraceEvent;

pub const DEFAULT_AUTHOR: &str = "Commissioner";

/// Render picks as a Markdown article: title, intro, a `## Round N` header
/// at every round change, and one section per pick.
pub fn to_markdown_article(title: &str, league_name: &str, picks: &[PickRecord]) -> String {
    let mut lines: Vec<String> = vec![
        format!("# {title}"),
        String::new(),
        format!(
            "With the rookie draft approaching in {league_name}, here's a data-assisted mock \
             based on team needs, positional value, and a shared player pool."
        ),
        String::new(),
    ];

    let mut current_round = None;
    for pick in picks {
        let round = round_of_pick_number(&pick.pick_number).unwrap_or(1);
        if current_round != Some(round) {
            current_round = Some(round);
            lines.push(format!("## Round {round}"));
            lines.push(String::new());
        }
        lines.push(format!("### {} - Team {}", pick.pick_number, pick.team_name));
        lines.push(format!(
            "**Projected Pick: {}, {}**",
            pick.player.name,
            pick.player.position_label()
        ));
        lines.push(String::new());
        lines.push(pick.reason.clone());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Everything needed to publish a finished draft.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub author: Option<&'a str>,
    pub article: &'a str,
    pub picks: &'a [PickRecord],
    /// `None` when tracing was off for the run.
    pub trace: Option<&'a [TraceEvent]>,
    pub league_id: Option<&'a str>,
    pub model: Option<&'a str>,
}

impl PublishRequest<'_> {
    pub fn to_document(&self) -> NewMockDraft {
        let mut meta = json!({
            "league_id": self.league_id,
            "model": self.model,
            "picks": self.picks,
        });
        if let Some(trace) = self.trace {
            meta["trace"] = json!(trace);
        }
        NewMockDraft {
            title: self.title.to_string(),
            description: self.description.to_string(),
            content: self.article.to_string(),
            author: self.author.unwrap_or(DEFAULT_AUTHOR).to_string(),
            meta,
        }
    }
}
