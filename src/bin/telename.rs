use clap::Parser;

use tele::cli::TelenameCli;
use tele::core::util::name_util::to_valid_name;

fn main() {
    let cli = TelenameCli::parse();

    if cli.name.is_empty() {
        println!("telename");
        return;
    }
    println!("{}", to_valid_name(&cli.name));
}
