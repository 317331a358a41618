//! Command-line interface definition using clap.

use clap::Parser;

/// Convert a Google Hangouts Takeout export into SMS/MMS backup XML.
#[derive(Parser, Debug, Clone)]
#[command(name = "hangsms")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    hangsms --phone-number +15551234567
    hangsms -n +15551234567 -i takeout/Hangouts.json -o messages.xml

Partial failures (undownloadable attachments, messages without a sender)
are logged and skipped; only a missing or unparsable input file aborts.")]
pub struct Args {
    /// Your own phone number; the export frequently omits it
    #[arg(short = 'n', long, value_name = "NUMBER")]
    pub phone_number: String,

    /// Path to the Takeout JSON file to read
    #[arg(short, long, default_value = "Hangouts.json")]
    pub input: String,

    /// Path to the backup XML file to write
    #[arg(short, long, default_value = "messages.xml")]
    pub output: String,
}
