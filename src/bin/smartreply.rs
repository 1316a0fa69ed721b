use smartreply::tui;

fn output_header() -> &'static str {
    "SmartReply\nSmartReply asks Gemini for reply variants to a pasted chat message and relays each one to a chat webhook."
}

fn print_header() {
    println!("{}\n", output_header());
}

fn run() -> Result<(), String> {
    print_header();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return Err("smartreply takes no arguments; run it and fill in the form".to_string());
    }
    let output = tui::form::cmd_form()?;
    println!("{output}");
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
