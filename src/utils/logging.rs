//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use crate::config::Config;
use tracing::info;

/// 记录服务启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 StudyCard 服务启动");
    info!("🌐 监听地址: {}", config.bind_address);
    info!(
        "🗄️ 数据表: {} / {} (每批最多 {} 条)",
        config.flashcards_table, config.uploads_table, config.batch_size
    );
    info!("🖼️ 单次最多 {} 张图片", config.max_images);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefghij", 4), "abcd...");
        // 按字符截断，不会切断多字节字符
        assert_eq!(truncate_text("你好世界", 2), "你好...");
    }
}
