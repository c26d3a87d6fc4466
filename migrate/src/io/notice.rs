//! Success and failure notices for the host to display.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::report::Reporter;

const HTML_TEMPLATE: &str = include_str!("templates/notice.html");
const TEXT_TEMPLATE: &str = include_str!("templates/notice.txt");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A renderable notice: title, body lines and an optional closing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub lines: Vec<String>,
    pub footer: Option<String>,
}

impl Notice {
    /// Notice for a successful run. Lines are the success narrative entries.
    pub fn success(reporter: &Reporter) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: reporter.success_title(),
            lines: reporter.success_entries().to_vec(),
            footer: None,
        }
    }

    /// Notice for a failed run, if a failure was recorded.
    pub fn failure(reporter: &Reporter) -> Option<Self> {
        let failure = reporter.failure()?;
        Some(Self {
            level: NoticeLevel::Error,
            title: failure.title.clone(),
            lines: failure.messages.clone(),
            footer: Some(format!(
                "{} will not have any effect until the issues are resolved.",
                reporter.component_name()
            )),
        })
    }

    pub fn render_html(&self) -> Result<String> {
        NoticeEngine::new().render("notice.html", self)
    }

    pub fn render_text(&self) -> Result<String> {
        NoticeEngine::new().render("notice.txt", self)
    }
}

/// Template engine wrapper around minijinja.
struct NoticeEngine {
    env: Environment<'static>,
}

impl NoticeEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("notice.html", HTML_TEMPLATE)
            .expect("html notice template should be valid");
        env.add_template("notice.txt", TEXT_TEMPLATE)
            .expect("text notice template should be valid");
        Self { env }
    }

    fn render(&self, name: &str, notice: &Notice) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template.render(context! {
            level => notice.level,
            title => notice.title.as_str(),
            lines => notice.lines.as_slice(),
            footer => notice.footer.as_deref(),
            // Failure messages are separate paragraphs.
            blank_between => notice.level == NoticeLevel::Error,
        })?;
        Ok(rendered)
    }
}
