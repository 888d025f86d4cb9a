//! 上传标题 / 分组命名
//!
//! 纯函数为主；只有 `upload_count_in_group` 需要读取上传记录，
//! 带 `_on` 后缀的版本显式接收日期，方便测试。

use crate::error::AppResult;
use crate::models::{GeneratedCard, Upload};
use crate::services::study_repository::StudyRepository;
use chrono::{Local, NaiveDate};
use phf::phf_ordered_map;

/// 只检查前几张卡片的问题
const CARDS_TO_INSPECT: usize = 3;

/// 用户提示词短于该长度时才用作分组名
const MAX_PROMPT_NAME_CHARS: usize = 30;

/// 分类 → 关键词（小写），声明顺序即优先级
static CATEGORY_KEYWORDS: phf::OrderedMap<&'static str, &'static [&'static str]> = phf_ordered_map! {
    "Grammar" => &["grammar", "conjugat", "tense", "verb", "subjunctive", "pronoun", "article", "preposition"],
    "Vocabulary" => &["vocabulary", "translate", "what does", "meaning", "word for", "definition"],
    "Conversation" => &["conversation", "how do you say", "greeting", "respond", "dialogue", "introduce"],
    "Survival Phrases" => &["emergency", "help", "directions", "bathroom", "hospital", "police", "how much"],
};

/// 根据卡片内容推断分组名（使用今天的日期）
pub fn generate_group_name(cards: &[GeneratedCard], prompt: Option<&str>) -> String {
    generate_group_name_on(cards, prompt, Local::now().date_naive())
}

/// 根据卡片内容推断分组名
///
/// 1. 前 3 张卡片的问题命中某个分类的关键词（不区分大小写）：`"{分类} - {日期}"`
/// 2. 否则提示词短于 30 个字符：`"{提示词} - {日期}"`
/// 3. 否则 `"Study Set - {日期}"`
pub fn generate_group_name_on(cards: &[GeneratedCard], prompt: Option<&str>, date: NaiveDate) -> String {
    let date = format_date(date);

    if let Some(category) = match_category(cards) {
        return format!("{} - {}", category, date);
    }

    match prompt {
        Some(prompt) if !prompt.is_empty() && prompt.chars().count() < MAX_PROMPT_NAME_CHARS => {
            format!("{} - {}", prompt, date)
        }
        _ => format!("Study Set - {}", date),
    }
}

/// 按表的声明顺序找到第一个命中的分类
fn match_category(cards: &[GeneratedCard]) -> Option<&'static str> {
    let fronts: Vec<String> = cards
        .iter()
        .take(CARDS_TO_INSPECT)
        .map(|card| card.front.to_lowercase())
        .collect();

    CATEGORY_KEYWORDS
        .entries()
        .find(|(_, keywords)| {
            fronts
                .iter()
                .any(|front| keywords.iter().any(|keyword| front.contains(keyword)))
        })
        .map(|(category, _)| *category)
}

/// `MMM D, YYYY`，例如 `Mar 5, 2025`
fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// 下一个序号：同课程且标题包含分组名的上传数量 + 1
///
/// 上传记录不保存分组，这里用标题子串近似判断，
/// 一个分组名是另一个分组名的子串时会误计
pub fn count_uploads_in_group(uploads: &[Upload], course: &str, group: &str) -> u32 {
    let count = uploads
        .iter()
        .filter(|upload| upload.course.as_deref() == Some(course) && upload.summary.contains(group))
        .count();
    count as u32 + 1
}

/// 读取全部上传记录后计算下一个序号
pub async fn upload_count_in_group(repository: &StudyRepository, course: &str, group: &str) -> AppResult<u32> {
    let uploads = repository.get_uploads().await?;
    Ok(count_uploads_in_group(&uploads, course, group))
}

/// 生成上传标题，按优先级：
///
/// 1. 有内容描述：`"{描述} - {n} cards"`
/// 2. 有分组且序号大于 1：`"{分组} #{序号} - {n} cards"`
/// 3. 有课程：`"{课程} #{序号}  - {n} cards"`（序号可省略）
/// 4. 否则：`"Study Set #{序号} - {n} cards"`（序号可省略）
pub fn generate_upload_title(
    card_count: usize,
    course: Option<&str>,
    group: Option<&str>,
    content_description: Option<&str>,
    incremental: Option<u32>,
) -> String {
    let number = incremental
        .filter(|n| *n > 0)
        .map(|n| format!(" #{}", n))
        .unwrap_or_default();

    if let Some(description) = content_description {
        return format!("{} - {} cards", description, card_count);
    }

    match (group, incremental) {
        (Some(group), Some(n)) if n > 1 => format!("{} #{} - {} cards", group, n, card_count),
        _ => match course {
            // 课程标题在连字符前保留两个空格，与已有数据一致
            Some(course) => format!("{}{}  - {} cards", course, number, card_count),
            None => format!("Study Set{} - {} cards", number, card_count),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    fn cards(fronts: &[&str]) -> Vec<GeneratedCard> {
        fronts.iter().map(|f| GeneratedCard::new(*f, "answer")).collect()
    }

    fn upload(course: Option<&str>, summary: &str) -> Upload {
        Upload {
            id: format!("rec{}", summary.len()),
            reference: None,
            date: "2025-03-01".to_string(),
            summary: summary.to_string(),
            book_page: None,
            course: course.map(str::to_string),
            image_count: 1,
            focus_prompt: None,
        }
    }

    #[test]
    fn test_group_name_from_category() {
        let name = generate_group_name_on(&cards(&["Conjugate 'ser' in the present tense"]), None, date());
        assert_eq!(name, "Grammar - Mar 5, 2025");
    }

    #[test]
    fn test_group_name_is_case_insensitive() {
        let name = generate_group_name_on(&cards(&["TRANSLATE: el perro"]), None, date());
        assert_eq!(name, "Vocabulary - Mar 5, 2025");
    }

    #[test]
    fn test_group_name_first_category_wins() {
        // 同时命中 Vocabulary 和 Grammar 时取声明顺序靠前的 Grammar
        let name = generate_group_name_on(
            &cards(&["Translate 'to eat'", "Which verb means to run?"]),
            None,
            date(),
        );
        assert_eq!(name, "Grammar - Mar 5, 2025");
    }

    #[test]
    fn test_group_name_only_inspects_first_three_cards() {
        let fronts = ["Capital of Peru?", "Largest ocean?", "Tallest mountain?", "Where is the bathroom?"];
        let name = generate_group_name_on(&cards(&fronts), None, date());
        assert_eq!(name, "Study Set - Mar 5, 2025");
    }

    #[test]
    fn test_group_name_falls_back_to_short_prompt() {
        let fronts = cards(&["Capital of Peru?"]);
        assert_eq!(
            generate_group_name_on(&fronts, Some("Geography"), date()),
            "Geography - Mar 5, 2025"
        );

        let long_prompt = "Focus on every capital city in South America";
        assert_eq!(
            generate_group_name_on(&fronts, Some(long_prompt), date()),
            "Study Set - Mar 5, 2025"
        );
    }

    #[test]
    fn test_count_uploads_in_group() {
        let uploads = vec![
            upload(Some("Spanish"), "Travel #1 - 5 cards"),
            upload(Some("Spanish"), "Travel #2 - 6 cards"),
            upload(Some("Spanish"), "Food - 4 cards"),
            upload(Some("French"), "Travel - 3 cards"),
            upload(None, "Travel - 3 cards"),
        ];
        assert_eq!(count_uploads_in_group(&uploads, "Spanish", "Travel"), 3);
        assert_eq!(count_uploads_in_group(&uploads, "German", "Travel"), 1);
    }

    #[test]
    fn test_upload_title_with_description() {
        let title = generate_upload_title(7, Some("Spanish"), Some("Unit 1"), Some("Verbs"), Some(4));
        assert_eq!(title, "Verbs - 7 cards");
    }

    #[test]
    fn test_upload_title_with_group_and_incremental() {
        let title = generate_upload_title(5, None, Some("Unit 1"), None, Some(3));
        assert_eq!(title, "Unit 1 #3 - 5 cards");
    }

    #[test]
    fn test_upload_title_first_in_group_uses_course() {
        let title = generate_upload_title(5, Some("Spanish"), Some("Unit 1"), None, Some(1));
        assert_eq!(title, "Spanish #1  - 5 cards");
    }

    #[test]
    fn test_upload_title_course_without_incremental() {
        assert_eq!(generate_upload_title(2, Some("Spanish"), None, None, None), "Spanish  - 2 cards");
    }

    #[test]
    fn test_upload_title_defaults() {
        assert_eq!(generate_upload_title(4, None, None, None, None), "Study Set - 4 cards");
        assert_eq!(generate_upload_title(4, None, None, None, Some(2)), "Study Set #2 - 4 cards");
    }
}
