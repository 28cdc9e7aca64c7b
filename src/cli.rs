//! Command-line argument parsing for sipprobe

/// Parsed command line arguments
pub struct Args {
    pub register_only: bool,
    pub call_only: bool,
    pub validate: bool,
    pub help: bool,
    pub output: Option<String>,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_from(&args)
}

fn parse_from(args: &[String]) -> Args {
    let mut result = Args {
        register_only: false,
        call_only: false,
        validate: false,
        help: false,
        output: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--register" => result.register_only = true,
            "--call" => result.call_only = true,
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            "--output" => {
                if i + 1 < args.len() {
                    i += 1;
                    result.output = Some(args[i].clone());
                }
            }
            _ => {}
        }
        i += 1;
    }

    result
}

pub fn print_help() {
    println!("sipprobe - SIP registration and call-setup delay probe\n");
    println!("USAGE:");
    println!("    sipprobe [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --register              Run only the REGISTER probe");
    println!("    --call                  Run only the INVITE probe (registers first)");
    println!("    --validate              Validate configuration and exit");
    println!("    --output PATH           Write the timing report to PATH");
    println!("    --help, -h              Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    SIP_PROXY, SIP_PORT, SIP_USERNAME, SIP_PASSWORD, SIP_DOMAIN,");
    println!("    SIP_CALLEE, SIP_RECV_TIMEOUT_MS, SIP_CSEQ_RETRY, SIP_USER_AGENT,");
    println!("    SIPPROBE_RESULTS_PATH (loaded from the environment or a .env file)");
}
