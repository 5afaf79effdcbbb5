// ==========================================
// 现场服务管理系统 - 数据导入命令行入口
// ==========================================
// 用法: field-service-import [db] <entity> <file> [--commit] [--actor NAME]
// 流程: 预览 → 建批 → 校验 → (提交) → 输出进度
// ==========================================

use anyhow::{bail, Context};
use field_service_import::{logging, EntityType, ImportApi};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const USAGE: &str = "用法: field-service-import [db] <entity> <file> [--commit] [--actor NAME]";

struct CliArgs {
    db_path: String,
    entity: EntityType,
    file: PathBuf,
    commit: bool,
    actor: Option<String>,
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 FIELD_SERVICE_IMPORT_DB_PATH > 用户数据目录 > 当前目录
fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("FIELD_SERVICE_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./field_service_import.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("field-service-import");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("import.db");
        }
    }

    path.to_string_lossy().to_string()
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut positional = Vec::new();
    let mut commit = false;
    let mut actor = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--commit" => commit = true,
            "--actor" => {
                let name = iter.next().context("--actor 缺少参数")?;
                actor = Some(name);
            }
            flag if flag.starts_with("--") => bail!("未知参数: {}\n{}", flag, USAGE),
            _ => positional.push(arg),
        }
    }

    let (db_path, entity, file) = match positional.as_slice() {
        [db, entity, file] => (db.clone(), entity, file),
        [entity, file] => (get_default_db_path(), entity, file),
        _ => bail!("{}", USAGE),
    };

    let entity = entity
        .parse::<EntityType>()
        .map_err(|e| anyhow::anyhow!("{}\n{}", e, USAGE))?;

    Ok(CliArgs {
        db_path,
        entity,
        file: PathBuf::from(file),
        commit,
        actor,
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = parse_args(std::env::args().skip(1))?;

    tracing::info!("==================================================");
    tracing::info!("{} v{}", field_service_import::APP_NAME, field_service_import::VERSION);
    tracing::info!("使用数据库: {}", args.db_path);
    tracing::info!("==================================================");

    let content = std::fs::read(&args.file)
        .with_context(|| format!("无法读取文件: {}", args.file.display()))?;

    let api = ImportApi::open(&args.db_path).await?;

    let preview = api.preview_file(args.entity, &content, Some(5))?;
    tracing::info!(
        encoding = %preview.encoding,
        delimiter = %preview.delimiter,
        total_rows = preview.total_rows,
        "文件预览完成"
    );
    if !preview.unmapped_fields.is_empty() {
        tracing::warn!("未匹配字段: {}", preview.unmapped_fields.join(", "));
    }

    let batch = api
        .create_batch(
            args.entity.as_str(),
            &file_name_of(&args.file),
            content,
            BTreeMap::new(),
            args.actor.clone(),
        )
        .await?;
    tracing::info!("批次已创建: {} ({})", batch.batch_number, batch.batch_id);

    let report = api.validate_batch(&batch.batch_id).await?;
    tracing::info!(
        rows_valid = report.rows_valid,
        rows_error = report.rows_error,
        "校验完成"
    );

    if args.commit {
        let summary = api.commit_batch(&batch.batch_id, args.actor.as_deref()).await?;
        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            "提交完成"
        );
    }

    let progress = api.get_progress(&batch.batch_id).await?;
    println!("{}", serde_json::to_string_pretty(&progress)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_full() {
        let parsed = parse_args(args(&[
            "import.db",
            "customers",
            "c.csv",
            "--commit",
            "--actor",
            "alice",
        ]))
        .unwrap();
        assert_eq!(parsed.db_path, "import.db");
        assert_eq!(parsed.entity, EntityType::Customers);
        assert!(parsed.commit);
        assert_eq!(parsed.actor.as_deref(), Some("alice"));
    }

    #[test]
    fn test_parse_args_rejects_unknown_entity() {
        assert!(parse_args(args(&["db", "widgets", "w.csv"])).is_err());
        assert!(parse_args(args(&["only_one"])).is_err());
    }
}
