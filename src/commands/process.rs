use std::io::Write;

use anyhow::{Context, Result};
use tracing::info;
use w2extract::W2Extractor;
use w2extract::util::write_json_pretty;

use crate::cli::ProcessArgs;

pub fn run(args: ProcessArgs) -> Result<()> {
    let config = args.extractor.load_config()?;
    let extractor = W2Extractor::new(config)?;

    let mut result = extractor.process(&args.path);
    if args.omit_raw_text {
        result.raw_text.clear();
    }

    info!(
        path = %args.path.display(),
        is_w2_match = result.is_w2_match,
        confidence = result.confidence,
        fields = result.extracted_fields.len(),
        "extraction finished"
    );

    match &args.output {
        Some(output) => {
            write_json_pretty(output, &result)?;
            info!(path = %output.display(), "wrote extraction result");
        }
        None => {
            let data =
                serde_json::to_string_pretty(&result).context("failed to serialize result")?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{data}").context("failed to write result to stdout")?;
        }
    }

    Ok(())
}
