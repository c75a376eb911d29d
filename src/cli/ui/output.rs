use console::{StyledObject, style};

use crate::analysis::ChunkPlan;
use crate::types::{ScoreGrade, UnifiedResult};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn result(&self, result: &UnifiedResult) {
        if result.already_optimal {
            self.success(&format!(
                "Prompt length is already optimal ({} tokens)",
                result.token_count
            ));
            return;
        }

        self.header("Prompt Analysis");
        println!("  Score:  {}", score(result));
        if result.was_chunked {
            println!(
                "  Tokens: {} (analyzed in {} chunks)",
                result.token_count, result.chunk_count
            );
        } else {
            println!("  Tokens: {}", result.token_count);
        }

        self.section("Suggestions");
        if result.suggestions.is_empty() {
            println!("  {}", style("none").dim());
        }
        for (i, suggestion) in result.suggestions.iter().enumerate() {
            println!("  {}. {}", i + 1, suggestion);
        }

        self.section("Reworded Prompt");
        if result.reword.is_empty() {
            println!("  {}", style("none").dim());
        } else {
            println!("{}", result.reword);
        }
    }

    pub fn plan(&self, plan: &ChunkPlan) {
        self.header("Chunk Plan");
        println!("  Strategy: {}", style(plan.strategy).cyan());
        println!("  Tokens:   {}", plan.token_count);
        println!("  Limit:    {}", plan.token_limit);

        if plan.is_chunked() {
            self.section(&format!("{} chunks", plan.chunk_count));
            for (i, window) in plan.boundaries.iter().enumerate() {
                println!(
                    "  {:>3}. tokens {}..{} ({})",
                    i + 1,
                    window.start,
                    window.end,
                    window.len()
                );
            }
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

/// Score coloured by grade band
fn score(result: &UnifiedResult) -> StyledObject<String> {
    let text = format!("{:.1}", result.accuracy);
    match result.grade() {
        ScoreGrade::Good => style(text).green().bold(),
        ScoreGrade::Fair => style(text).yellow().bold(),
        ScoreGrade::Poor => style(text).red().bold(),
    }
}
