use ghmon_core::config::RedactedConfig;
use ghmon_core::model::record::Record;

pub fn print_record_human(record: &Record) {
    println!("{} t={}", record.measurement, record.timestamp);
    for (key, value) in &record.tags {
        println!("  tag   {key:<16} {value}");
    }
    for (key, value) in &record.fields {
        println!("  field {key:<16} {value}");
    }
}

pub fn print_config_human(cfg: &RedactedConfig) {
    let dash = || "-".to_string();
    println!("arc_url         {}", cfg.arc_url);
    println!("arc_token       {}", cfg.arc_token.clone().unwrap_or_else(dash));
    println!("arc_database    {}", cfg.arc_database);
    println!("repos           {}", cfg.repos.join(","));
    println!("github_token    {}", cfg.github_token.clone().unwrap_or_else(dash));
    println!("github_api_url  {}", cfg.github_api_url);
    println!("interval        {}", cfg.interval);
    println!("request_delay   {}", cfg.request_delay);
    println!("fetch_timeout   {}", cfg.fetch_timeout);
    println!("ship_timeout    {}", cfg.ship_timeout);
}
