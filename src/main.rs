use jingwen_tui::RunOptions;

fn main() {
    let options = match handle_cli_flags() {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = jingwen_tui::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Parses flags. `Ok(None)` means an informational flag was handled and the
/// program should exit.
fn handle_cli_flags() -> Result<Option<RunOptions>, String> {
    let mut options = RunOptions::default();
    let mut saw_info_flag = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Jingwen-TUI {}", jingwen_tui::VERSION);
                saw_info_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "Jingwen-TUI: read the daily prayers and baogao from the terminal.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --base-url <url>     Content server to read from\n  --demo               Use the built-in sample content"
                );
                saw_info_flag = true;
            }
            "--base-url" => match args.next() {
                Some(url) => options.base_url = Some(url),
                None => return Err("--base-url requires a value".to_string()),
            },
            "--demo" => options.demo = true,
            other => {
                if let Some(url) = other.strip_prefix("--base-url=") {
                    options.base_url = Some(url.to_string());
                } else {
                    return Err(format!("unknown argument {other:?} (see --help)"));
                }
            }
        }
    }
    if saw_info_flag {
        Ok(None)
    } else {
        Ok(Some(options))
    }
}
