//! `vendorwatch run`: wire store, prober, notifier, monitor and bot together.

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, bail},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
    vendorwatch_browser::{FormProber, ProbeSettings, detect},
    vendorwatch_config::{Severity, VendorwatchConfig, validate::check_semantics},
    vendorwatch_monitor::{
        ChangeDispatcher, MessageComposer, MonitorHandle, MonitorService, MonitorSettings,
    },
    vendorwatch_store::{SqliteStore, SubscriberStore},
    vendorwatch_telegram::{BotContext, TelegramNotifier, build_bot, start_polling},
};

pub async fn run(config: VendorwatchConfig, data_dir: PathBuf) -> anyhow::Result<()> {
    let problems: Vec<String> = check_semantics(&config)
        .into_iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.to_string())
        .collect();
    if !problems.is_empty() {
        bail!("invalid configuration:\n  {}", problems.join("\n  "));
    }
    let Some(token) = config.telegram.token_str() else {
        bail!("no bot token; set telegram.token or TELEGRAM_BOT_TOKEN");
    };

    match detect::detect_browser(config.browser.chrome_path.as_deref()) {
        Some(path) => info!(path = %path.display(), "using chrome"),
        None => warn!("{}", detect::install_hint()),
    }

    let db_path = config.storage.database_path_in(&data_dir);
    let store: Arc<dyn SubscriberStore> = Arc::new(
        SqliteStore::open(&db_path)
            .await
            .with_context(|| format!("opening {}", db_path.display()))?,
    );

    let artifacts_dir = config.artifacts.dir_in(&data_dir);
    tokio::fs::create_dir_all(&artifacts_dir)
        .await
        .with_context(|| format!("creating {}", artifacts_dir.display()))?;
    let prober = Arc::new(FormProber::new(ProbeSettings::from_config(
        &config,
        artifacts_dir,
    )));

    let bot = build_bot(token, config.telegram.poll_timeout_secs)?;
    let notifier = Arc::new(TelegramNotifier::new(bot.clone()));
    let composer = MessageComposer::from_config(&config.target.url, &config.monitor.timezone)?;
    let dispatcher = ChangeDispatcher::new(Arc::clone(&store), notifier, composer);
    let service = MonitorService::new(
        Arc::clone(&store),
        prober,
        dispatcher,
        MonitorSettings::from(&config.monitor),
    );

    let cancel = CancellationToken::new();
    let (handle, triggers) = MonitorHandle::channel();
    let bot_task = start_polling(
        bot,
        BotContext {
            store,
            monitor: handle,
        },
        config.telegram.poll_timeout_secs,
        cancel.clone(),
    )
    .await
    .context("starting telegram bot")?;
    let monitor_task = service.start(triggers, cancel.clone());

    info!(
        database = %db_path.display(),
        target = %config.target.url,
        "vendorwatch running, press Ctrl-C to stop"
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl-C")?;
            info!("shutdown requested");
        },
        () = cancel.cancelled() => warn!("shutting down after bot stopped"),
    }
    cancel.cancel();

    let (bot_result, monitor_result) = tokio::join!(bot_task, monitor_task);
    if let Err(e) = bot_result {
        warn!(error = %e, "telegram task ended abnormally");
    }
    if let Err(e) = monitor_result {
        warn!(error = %e, "monitor task ended abnormally");
    }
    Ok(())
}
