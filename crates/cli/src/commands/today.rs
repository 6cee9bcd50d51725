//! Today command - hashtags scheduled for today

use anyhow::Result;
use hashtag_tracker_domain::{Clock, SystemClock, calendar::today_in};
use std::path::PathBuf;

use crate::commands::user_error;
use crate::config::AppConfig;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let today = today_in(SystemClock.now(), config.time_zone()?);

    let tags = config
        .schedule
        .tags_on(today.weekday())
        .map_err(user_error)?;

    println!("{}:", today.weekday());
    for tag in tags {
        println!("  #{}", tag);
    }
    Ok(())
}
