//! Natural-language questions over a loaded table.
//!
//! A [`ColumnClassifier`] picks the column a question is about, the loop
//! turns the table into a compact statistical context around that column,
//! and an [`AnswerAgent`] phrases the answer.

mod agent;
mod classifier;

pub use agent::{AnswerAgent, ChatCompletionAgent};
pub use classifier::{ColumnClassifier, KeywordClassifier};

use std::fmt::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::AskError;
use crate::models::{AuthorRow, Column};
use crate::stats;

/// Values listed for the hinted column.
const CONTEXT_TOP_VALUES: usize = 15;

/// Authors listed in the summary block.
const CONTEXT_TOP_AUTHORS: usize = 10;

/// Input that ends the loop.
const EXIT_COMMAND: &str = "exit";

/// Reads questions and prints answers until EOF or `exit`.
pub struct QuestionLoop {
    rows: Vec<AuthorRow>,
    classifier: Box<dyn ColumnClassifier>,
    agent: Box<dyn AnswerAgent>,
}

impl QuestionLoop {
    #[must_use]
    pub fn new(
        rows: Vec<AuthorRow>,
        classifier: Box<dyn ColumnClassifier>,
        agent: Box<dyn AnswerAgent>,
    ) -> Self {
        Self { rows, classifier, agent }
    }

    /// Context block for one question.
    #[must_use]
    pub fn build_context(&self, question: &str) -> String {
        let column = self.classifier.classify(question);
        let summary = stats::summarize(&self.rows, CONTEXT_TOP_AUTHORS);

        let mut context = String::new();
        let _ = writeln!(context, "Rows: {}", summary.total_rows);
        let _ = writeln!(context, "Distinct publications: {}", summary.total_publications);
        let _ = writeln!(context, "Average citations per publication: {:.2}", summary.average_citations);

        let years: Vec<String> = summary.by_year.iter().map(|(year, n)| format!("{year}: {n}")).collect();
        if !years.is_empty() {
            let _ = writeln!(context, "Publications per year: {}", years.join(", "));
        }

        let authors: Vec<String> =
            summary.top_authors.iter().map(|a| format!("{} ({})", a.author, a.publications)).collect();
        if !authors.is_empty() {
            let _ = writeln!(context, "Top authors by publications: {}", authors.join("; "));
        }

        match column {
            Some(column) => {
                let _ = writeln!(context, "Question concerns column: {column}");
                let values = stats::top_values(&self.rows, column, CONTEXT_TOP_VALUES);
                if !values.is_empty() {
                    let _ = writeln!(context, "Most frequent {column} values (rows):");
                    for (value, count) in values {
                        let _ = writeln!(context, "- {value}: {count}");
                    }
                }
            }
            None => {
                let _ = writeln!(context, "Question concerns column: unknown");
            }
        }

        context
    }

    /// Answer one question.
    pub async fn ask(&self, question: &str) -> Result<String, AskError> {
        let context = self.build_context(question);
        self.agent.answer(question, &context).await
    }

    /// Read questions line by line from `reader`, writing answers to `writer`.
    ///
    /// Blank lines are skipped. A failed answer is reported and the loop goes on.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<usize, AskError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut answered = 0;

        writer.write_all(b"> ").await?;
        writer.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let question = line.trim();
            if question.eq_ignore_ascii_case(EXIT_COMMAND) {
                break;
            }
            if !question.is_empty() {
                match self.ask(question).await {
                    Ok(answer) => {
                        writer.write_all(answer.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        answered += 1;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Question failed");
                        writer.write_all(format!("error: {err}\n").as_bytes()).await?;
                    }
                }
            }
            writer.write_all(b"> ").await?;
            writer.flush().await?;
        }

        writer.flush().await?;
        Ok(answered)
    }
}

impl std::fmt::Debug for QuestionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionLoop").field("rows", &self.rows.len()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoAgent;

    #[async_trait]
    impl AnswerAgent for EchoAgent {
        async fn answer(&self, question: &str, _context: &str) -> Result<String, AskError> {
            if question == "fail" {
                return Err(AskError::EmptyAnswer);
            }
            Ok(format!("answer to {question}"))
        }
    }

    fn rows() -> Vec<AuthorRow> {
        vec![
            AuthorRow {
                uid: "WOS:1".to_string(),
                author_display_name: Some("Yilmaz, A".to_string()),
                publish_year: Some(2022),
                citation_count: 4,
                organization: "Org".to_string(),
                ..Default::default()
            },
            AuthorRow {
                uid: "WOS:2".to_string(),
                author_display_name: Some("Yilmaz, A".to_string()),
                publish_year: Some(2023),
                organization: "Org".to_string(),
                ..Default::default()
            },
        ]
    }

    fn question_loop() -> QuestionLoop {
        QuestionLoop::new(rows(), Box::new(KeywordClassifier::new()), Box::new(EchoAgent))
    }

    #[test]
    fn test_context_mentions_column_and_values() {
        let context = question_loop().build_context("Which author publishes most?");
        assert!(context.contains("Distinct publications: 2"));
        assert!(context.contains("Question concerns column: Author Display Name"));
        assert!(context.contains("- Yilmaz, A: 2"));
        assert!(context.contains("2022: 1"));
    }

    #[tokio::test]
    async fn test_run_until_exit() {
        let input: &[u8] = b"first\n\nfail\nsecond\nexit\nnever\n";
        let mut output = Vec::new();

        let answered = question_loop().run(input, &mut output).await.unwrap();
        let text = String::from_utf8(output).unwrap();

        assert_eq!(answered, 2);
        assert!(text.contains("answer to first"));
        assert!(text.contains("error: "));
        assert!(text.contains("answer to second"));
        assert!(!text.contains("never"));
    }

    #[tokio::test]
    async fn test_run_until_eof() {
        let input: &[u8] = b"only\n";
        let mut output = Vec::new();
        assert_eq!(question_loop().run(input, &mut output).await.unwrap(), 1);
    }
}
