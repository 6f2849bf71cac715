//! Terminal output: assistant replies (plain or markdown), the input prompt,
//! error lines and the closing expense summary.

use std::io::{self, Write};
use std::os::fd::AsRawFd;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::usage::ExpenseReport;

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_ITALIC: &str = "\x1b[3m";
const ANSI_UNDERLINE: &str = "\x1b[4m";
const ANSI_STRIKE: &str = "\x1b[9m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_CYAN: &str = "\x1b[36m";

const CODE_INDENT: &str = "    ";

/// Whether stdout is attached to a terminal.
pub fn stdout_is_tty() -> bool {
    nix::unistd::isatty(io::stdout().as_raw_fd()).unwrap_or(false)
}

/// Prints chat output to stdout/stderr.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    markdown: bool,
    color: bool,
}

impl Renderer {
    pub fn new(markdown: bool, color: bool) -> Self {
        Self { markdown, color }
    }

    /// Text of an assistant reply as it will appear on screen.
    pub fn render_reply(&self, content: &str) -> String {
        if self.markdown {
            render_markdown(content, self.color)
        } else {
            content.to_string()
        }
    }

    pub fn print_reply(&self, content: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout);
        let _ = writeln!(stdout, "{}", self.render_reply(content));
        let _ = stdout.flush();
    }

    /// Prompt showing the running token total, e.g. `[42] >>> `.
    pub fn prompt(&self, total_tokens: u64) -> String {
        self.styled(ANSI_BOLD, &format!("[{}] >>> ", total_tokens))
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{}", self.styled(&format!("{ANSI_RED}{ANSI_BOLD}"), message));
    }

    /// The closing summary: tokens used and estimated cost.
    pub fn render_expense(&self, report: &ExpenseReport) -> String {
        let highlight = format!("{ANSI_GREEN}{ANSI_BOLD}");
        format!(
            "Total tokens used: {}\nEstimated expense: {}",
            self.styled(&highlight, &report.total_tokens.to_string()),
            self.styled(&highlight, &format!("${}", report.expense))
        )
    }

    pub fn print_expense(&self, report: &ExpenseReport) {
        println!();
        println!("{}", self.render_expense(report));
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

/// Tracks the active inline styles so they can be restored after a reset.
struct StyleStack {
    color: bool,
    active: Vec<&'static str>,
}

impl StyleStack {
    fn push(&mut self, out: &mut String, style: &'static str) {
        if self.color {
            out.push_str(style);
        }
        self.active.push(style);
    }

    fn pop(&mut self, out: &mut String) {
        self.active.pop();
        if self.color {
            out.push_str(ANSI_RESET);
            for style in &self.active {
                out.push_str(style);
            }
        }
    }
}

/// Separate the next block from the previous one by a blank line.
fn block_break(out: &mut String) {
    if out.is_empty() || out.ends_with("\n\n") {
        return;
    }
    if out.ends_with('\n') {
        out.push('\n');
    } else {
        out.push_str("\n\n");
    }
}

/// Render markdown for a terminal. With `color` off only the layout
/// (indentation, bullets, spacing) survives.
pub fn render_markdown(text: &str, color: bool) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut out = String::new();
    let mut styles = StyleStack {
        color,
        active: Vec::new(),
    };
    // Next number for ordered lists, `None` for bullets.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut code_block: Option<String> = None;
    let mut link: Option<String> = None;
    let mut first_cell = true;

    for event in Parser::new_ext(text, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                block_break(&mut out);
                styles.push(&mut out, ANSI_BOLD);
                if level == HeadingLevel::H1 {
                    styles.push(&mut out, ANSI_UNDERLINE);
                }
            }
            Event::End(TagEnd::Heading(level)) => {
                if level == HeadingLevel::H1 {
                    styles.pop(&mut out);
                }
                styles.pop(&mut out);
                out.push('\n');
            }
            Event::Start(Tag::Paragraph) => {
                if lists.is_empty() {
                    block_break(&mut out);
                }
            }
            Event::End(TagEnd::Paragraph) => out.push('\n'),
            Event::Start(Tag::CodeBlock(kind)) => {
                block_break(&mut out);
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        styles.push(&mut out, ANSI_DIM);
                        out.push_str(CODE_INDENT);
                        out.push_str(&lang);
                        styles.pop(&mut out);
                        out.push('\n');
                    }
                }
                code_block = Some(String::new());
            }
            Event::End(TagEnd::CodeBlock) => {
                let code = code_block.take().unwrap_or_default();
                styles.push(&mut out, ANSI_CYAN);
                for line in code.lines() {
                    out.push_str(CODE_INDENT);
                    out.push_str(line);
                    out.push('\n');
                }
                styles.pop(&mut out);
            }
            Event::Start(Tag::List(start)) => {
                if lists.is_empty() {
                    block_break(&mut out);
                } else if !out.ends_with('\n') {
                    out.push('\n');
                }
                lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                out.push_str(&"  ".repeat(lists.len().saturating_sub(1)));
                match lists.last_mut() {
                    Some(Some(n)) => {
                        out.push_str(&format!("{}. ", n));
                        *n += 1;
                    }
                    _ => out.push_str("• "),
                }
            }
            Event::End(TagEnd::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Start(Tag::Emphasis) => styles.push(&mut out, ANSI_ITALIC),
            Event::Start(Tag::Strong) => styles.push(&mut out, ANSI_BOLD),
            Event::Start(Tag::Strikethrough) => styles.push(&mut out, ANSI_STRIKE),
            Event::End(TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough) => {
                styles.pop(&mut out)
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                link = Some(dest_url.to_string());
                styles.push(&mut out, ANSI_UNDERLINE);
            }
            Event::End(TagEnd::Link) => {
                styles.pop(&mut out);
                if let Some(dest) = link.take() {
                    out.push_str(&format!(" ({})", dest));
                }
            }
            Event::Start(Tag::Table(_)) => block_break(&mut out),
            Event::Start(Tag::TableHead) => {
                first_cell = true;
                styles.push(&mut out, ANSI_BOLD);
            }
            Event::End(TagEnd::TableHead) => {
                styles.pop(&mut out);
                out.push('\n');
            }
            Event::Start(Tag::TableRow) => first_cell = true,
            Event::End(TagEnd::TableRow) => out.push('\n'),
            Event::Start(Tag::TableCell) => {
                if !first_cell {
                    out.push_str(" | ");
                }
                first_cell = false;
            }
            Event::Text(text) => match code_block.as_mut() {
                Some(code) => code.push_str(&text),
                None => out.push_str(&text),
            },
            Event::Code(code) => {
                if color {
                    styles.push(&mut out, ANSI_CYAN);
                    out.push_str(&code);
                    styles.pop(&mut out);
                } else {
                    out.push('`');
                    out.push_str(&code);
                    out.push('`');
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => out.push_str(&html),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Rule => {
                block_break(&mut out);
                out.push_str(&"─".repeat(40));
                out.push('\n');
            }
            Event::TaskListMarker(done) => out.push_str(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    out.trim_end_matches('\n').to_string()
}
