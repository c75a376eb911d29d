//! Plan Command
//!
//! Shows how a prompt would be sent, without calling the analysis service.

use std::path::PathBuf;

use crate::ai::tokenizer::Tokenizer;
use crate::analysis::ChunkPlanner;
use crate::cli::ui::Output;
use crate::cli::util::read_input;
use crate::config::ConfigLoader;
use crate::types::Result;

pub async fn run(text: Option<String>, file: Option<PathBuf>, json: bool) -> Result<()> {
    let text = read_input(text, file.as_deref())?;
    let config = ConfigLoader::load()?;

    let tokenizer = Tokenizer::new(config.analysis.encoding);
    let token_count = tokenizer.count(text.trim()).await?;
    let plan = ChunkPlanner::new(config.planner).plan(token_count);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        Output::new().plan(&plan);
    }
    Ok(())
}
