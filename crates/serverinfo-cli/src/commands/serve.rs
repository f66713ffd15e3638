use std::time::Duration;

use serverinfo_core::Settings;

pub fn run(settings: &Settings, host: &str, port: u16, auth: bool, loop_interval: Duration) {
    let (aggregator, sampler) = super::make_aggregator(loop_interval);

    let base = format!("http://{host}:{port}");
    println!("serverinfo v{}", serverinfo_core::VERSION);
    println!("   {base}");
    println!("   {} providers active", aggregator.provider_count());
    println!();
    println!("   Endpoints:");
    println!("     GET {}{}", settings.path, if auth { "  (basic auth)" } else { "" });
    println!("     GET {}", settings.doc_path());
    println!();
    println!("   Examples:");
    if auth {
        println!("     curl -u {}:<pass> {base}{}", settings.user, settings.path);
    } else {
        println!("     curl {base}{}", settings.path);
    }
    println!("     curl {base}{}", settings.doc_path());
    println!();

    let rt = super::runtime();
    rt.block_on(async {
        if let Err(e) = sampler.start() {
            super::fail(e);
        }
        if let Err(e) = serverinfo_server::run_server(aggregator, settings, host, port, auth).await
        {
            super::fail(format!("server on {host}:{port} failed: {e}"));
        }
        sampler.stop();
    });
}
