use std::collections::BTreeSet;
use std::fs;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use participant_engine::{
    cli::{Cli, Commands},
    config::{self, EngineConfig},
    error::ErrorCode,
    infra::{
        database::mask_database_url,
        migrate::{self, MigrationStatus},
        Database,
    },
    logging, ParticipantCommand, ParticipantEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    // 解析命令行参数
    let cli = Cli::parse();

    // 不依赖日志系统的子命令
    match &cli.command {
        Some(Commands::Migrate) => return run_migrate(&cli).await,
        Some(Commands::GenerateConfig { path }) => return generate_config(path),
        Some(Commands::ValidateConfig { path }) => return validate_config(path),
        Some(Commands::ShowConfig) => return show_config(&cli),
        _ => {}
    }

    // 快速读取配置文件的 [logging] 段（不加载完整配置）
    let early_log = config::load_early_logging_config(cli.config_file.as_deref());

    // 合并日志配置（优先级：CLI > 配置文件 > 默认值）
    let log_level = cli.get_log_level().unwrap_or(early_log.level);
    let log_format = cli.log_format.clone().or(early_log.format);
    let log_file = cli.log_file.clone().or(early_log.file);

    let _log_guard = logging::init_logging(
        &log_level,
        log_format.as_deref(),
        log_file.as_deref(),
        cli.quiet,
    )?;

    tracing::info!("🚀 Participant Engine starting...");

    let config = EngineConfig::load(&cli).context("加载配置失败")?;

    tracing::info!("📊 Engine Configuration:");
    tracing::info!("  - Storage Backend: {:?}", config.storage.backend);
    tracing::info!("  - Storage Timeout: {}ms", config.storage.timeout_ms);
    tracing::info!("  - Join Backlog: {:?}", config.policy.join_backlog);
    tracing::info!("  - Default Mute: {}h", config.policy.default_mute_hours);
    tracing::info!("  - Log Level: {}", config.logging.level);

    let engine = match ParticipantEngine::from_config(&config).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("❌ 引擎初始化失败: {}", e);
            tracing::error!("💡 请检查存储配置及数据库连接后重试");
            process::exit(1);
        }
    };

    match &cli.command {
        Some(Commands::Replay {
            path,
            include_inactive,
        }) => run_replay(&engine, path, *include_inactive).await,
        _ => {
            println!("💡 未指定子命令，使用 --help 查看用法");
            Ok(())
        }
    }
}

/// 回放命令日志（JSON Lines），输出每个涉及会话的参与者列表
async fn run_replay(engine: &ParticipantEngine, path: &str, include_inactive: bool) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("无法读取命令日志: {}", path))?;

    let mut commands = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command: ParticipantCommand = serde_json::from_str(line)
            .with_context(|| format!("第 {} 行命令格式错误", line_no + 1))?;
        commands.push(command);
    }

    let conversations: BTreeSet<u64> = commands
        .iter()
        .flat_map(|c| c.conversation_ids())
        .collect();

    tracing::info!("▶ 回放 {} 条命令，涉及 {} 个会话", commands.len(), conversations.len());
    let report = engine.dispatcher.dispatch_all(commands).await;
    for (index, error) in &report.failed {
        tracing::warn!(
            "  ⚠️ 命令 #{} 失败 (code={}): {}",
            index,
            ErrorCode::from(error) as u32,
            error
        );
    }
    tracing::info!(
        "✅ 回放完成: applied={}, failed={}",
        report.applied,
        report.failed.len()
    );

    for conversation_id in conversations {
        let participants = engine
            .service
            .list_participants(conversation_id, include_inactive)
            .await
            .with_context(|| format!("查询会话参与者失败: {}", conversation_id))?;
        let output = serde_json::json!({
            "conversation_id": conversation_id,
            "max_sequence": engine.sequences.current(conversation_id),
            "participants": participants,
        });
        println!("{}", serde_json::to_string(&output)?);
    }

    Ok(())
}

/// 生成默认配置文件
fn generate_config(path: &str) -> Result<()> {
    fs::write(path, config::DEFAULT_CONFIG_TOML)
        .with_context(|| format!("无法写入配置文件: {}", path))?;

    println!("✅ 配置文件已生成: {}", path);
    Ok(())
}

/// 验证配置文件
fn validate_config(path: &str) -> Result<()> {
    let config = EngineConfig::from_toml_file(path)
        .with_context(|| format!("配置文件验证失败: {}", path))?;
    config
        .validate()
        .with_context(|| format!("配置文件验证失败: {}", path))?;

    println!("✅ 配置文件有效: {}", path);
    println!("📊 配置摘要:");
    println!("  - Storage Backend: {:?}", config.storage.backend);
    println!("  - Storage Timeout: {}ms", config.storage.timeout_ms);
    println!("  - Join Backlog: {:?}", config.policy.join_backlog);
    println!("  - Event Bus Capacity: {}", config.event_bus.capacity);

    Ok(())
}

/// 执行数据库迁移（使用 [storage] 配置的连接池参数）
async fn run_migrate(cli: &Cli) -> Result<()> {
    let config = EngineConfig::load(cli).context("加载配置失败")?;

    println!("🔌 连接数据库: {}", mask_database_url(&config.storage.database_url));
    let database = Database::new(&config.storage)
        .await
        .context("数据库连接失败，请检查 DATABASE_URL")?;

    let statuses = migrate::run_migrations(&database)
        .await
        .context("执行迁移失败")?;

    let mut count = 0;
    for status in &statuses {
        match status {
            MigrationStatus::Skipped(name) => println!("  ⏭ {} (已执行，跳过)", name),
            MigrationStatus::Applied(name) => {
                println!("  ✅ {} 完成", name);
                count += 1;
            }
        }
    }

    if count == 0 {
        println!("✅ 数据库已是最新，无需迁移");
    } else {
        println!("✅ 成功执行 {} 个迁移", count);
    }

    database.into_pool().close().await;
    Ok(())
}

/// 显示最终配置（合并后的配置）
fn show_config(cli: &Cli) -> Result<()> {
    let _guard = logging::init_logging("info", None, None, false)?;

    let config = EngineConfig::load(cli).context("加载配置失败")?;

    println!("📊 最终配置（合并后的配置）:");
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}
