// Terminal topic report.
//
// Topics are listed in frequency order. The outlier topic is never printed:
// its "words" describe leftovers, not a theme.

use std::io::{self, Write};

use colored::Colorize;

use crate::topics::model::{TopicModel, OUTLIER_TOPIC};

/// Write every non-outlier topic with its words and relevance scores.
pub fn write_topic_details<W: Write>(out: &mut W, model: &TopicModel) -> io::Result<()> {
    writeln!(out, "{}", "Topic Details:".bold())?;

    for freq in model.topic_freq() {
        if freq.topic == OUTLIER_TOPIC {
            continue;
        }

        writeln!(out, "\n{}", format!("Topic {}:", freq.topic).bold())?;
        for (word, score) in model.get_topic(freq.topic).unwrap_or_default() {
            writeln!(out, "{} ({:.4})", word, score)?;
        }
    }

    Ok(())
}

/// Print the topic report to stdout.
pub fn display_topic_details(model: &TopicModel) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_topic_details(&mut handle, model)
}
