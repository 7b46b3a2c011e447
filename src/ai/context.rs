use crate::ai::llm::Content;
use crate::db::models::TrainingEntry;

/// Rendered when the knowledge store has no entries at all.
pub const EMPTY_KNOWLEDGE_PLACEHOLDER: &str = "لا توجد بيانات تدريب متوفرة حالياً.";

/// Rendered when the knowledge store could not be read.
pub const KNOWLEDGE_READ_ERROR: &str = "خطأ في استرجاع البيانات المدربة.";

const KNOWLEDGE_HEADER: &str =
    "بيانات مؤسسة الحبيب الطبية المعتمدة (يجب الالتزام بها حصرياً):\n";

/// Turns of prior history folded into the prompt, most recent first.
const HISTORY_WINDOW: usize = 10;

/// One prior exchange turn, already persisted on either surface.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Serialize the whole knowledge store into the context block embedded in
/// every prompt. An empty store renders a fixed placeholder, never an empty
/// block.
pub fn render_knowledge_block(entries: &[TrainingEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_KNOWLEDGE_PLACEHOLDER.to_string();
    }
    let mut block = String::from(KNOWLEDGE_HEADER);
    for entry in entries {
        block.push_str(&format!(
            "سؤال: {}\nإجابة: {}\n---\n",
            entry.question, entry.answer
        ));
    }
    block
}

fn system_instruction(knowledge_block: &str) -> String {
    format!(
        "أنت مساعد ذكي وخبير لمؤسسة الحبيب للمستلزمات الطبية (Al-Habib Medical Institution).\n\
         \n\
         قواعد العمل الصارمة:\n\
         1. الأولوية القصوى: استخدم البيانات المزودة في \"السياق المعتمد\" أدناه للإجابة على أي سؤال يتعلق بالمؤسسة أو خدماتها.\n\
         2. الدقة والذكاء: قدم إجابات مفصلة، مهنية، ومنظمة. إذا سأل المستخدم عن منتج أو خدمة موجودة في السياق، اشرحها بوضوح.\n\
         3. الالتزام بالسياق: إذا لم تجد المعلومة في السياق المعتمد، قل: \"عذراً، هذه المعلومة غير متوفرة لدي حالياً. يرجى التواصل مع إدارة مؤسسة الحبيب للمستلزمات الطبية لمزيد من التفاصيل.\"\n\
         4. ممنوع التخمين: لا تستخدم معلوماتك العامة للإجابة عن تفاصيل تخص المؤسسة (مثل الأسعار، العناوين، أو الوكالات) ما لم تكن موجودة في السياق.\n\
         5. اللغة: تحدث بلغة عربية فصحى، مهنية، وودودة.\n\
         6. المحادثات الطويلة: حافظ على ترابط الأفكار بناءً على تاريخ المحادثة المزود لك.\n\
         7. الإجابات الكاملة: تأكد من إكمال إجابتك بالكامل ولا تتوقف في منتصف الجملة.\n\
         \n\
         السياق المعتمد للمؤسسة:\n\
         {knowledge_block}"
    )
}

/// Assemble the generateContent payload turns: a bounded window of history
/// followed by one final "user" turn carrying the system instruction and the
/// new message. Never more than HISTORY_WINDOW + 1 turns in total.
pub fn build_contents(
    user_message: &str,
    history: &[ChatTurn],
    knowledge_block: &str,
) -> Vec<Content> {
    let mut contents = Vec::with_capacity(HISTORY_WINDOW + 1);

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for turn in &history[start..] {
        let role = if turn.role == "user" { "user" } else { "model" };
        contents.push(Content::new(role, turn.content.clone()));
    }

    let instruction = system_instruction(knowledge_block);
    contents.push(Content::new(
        "user",
        format!("{instruction}\n\nسؤال المستخدم الحالي: {user_message}"),
    ));

    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(question: &str, answer: &str) -> TrainingEntry {
        TrainingEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            question: question.to_string(),
            answer: answer.to_string(),
            source_type: "manual".to_string(),
            source_name: None,
            created_at: Utc::now(),
        }
    }

    fn turn(role: &str, content: &str) -> ChatTurn {
        ChatTurn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn empty_store_renders_placeholder() {
        let block = render_knowledge_block(&[]);
        assert_eq!(block, EMPTY_KNOWLEDGE_PLACEHOLDER);
    }

    #[test]
    fn knowledge_block_lists_every_entry() {
        let entries = vec![
            entry("ما هو اسم المؤسسة؟", "مؤسسة الحبيب"),
            entry("أين تقع المؤسسة؟", "في صنعاء"),
        ];
        let block = render_knowledge_block(&entries);
        assert!(block.starts_with(KNOWLEDGE_HEADER));
        assert!(block.contains("سؤال: ما هو اسم المؤسسة؟\nإجابة: مؤسسة الحبيب\n---\n"));
        assert!(block.contains("سؤال: أين تقع المؤسسة؟\nإجابة: في صنعاء\n---\n"));
    }

    #[test]
    fn history_window_keeps_the_most_recent_ten() {
        let history: Vec<ChatTurn> = (0..15)
            .map(|i| turn(if i % 2 == 0 { "user" } else { "assistant" }, &format!("m{i}")))
            .collect();

        let contents = build_contents("hello", &history, "كتلة");
        assert_eq!(contents.len(), 11);
        // Oldest five turns dropped
        assert_eq!(contents[0].parts[0].text, "m5");
        assert_eq!(contents[9].parts[0].text, "m14");
    }

    #[test]
    fn roles_map_to_user_and_model() {
        let history = vec![turn("user", "سؤال"), turn("assistant", "جواب")];
        let contents = build_contents("hello", &history, "كتلة");
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[2].role, "user");
    }

    #[test]
    fn final_turn_embeds_instruction_and_message() {
        let contents = build_contents("ما هي خدماتكم؟", &[], EMPTY_KNOWLEDGE_PLACEHOLDER);
        assert_eq!(contents.len(), 1);
        let text = &contents[0].parts[0].text;
        assert!(text.contains(EMPTY_KNOWLEDGE_PLACEHOLDER));
        assert!(text.ends_with("سؤال المستخدم الحالي: ما هي خدماتكم؟"));
        // Exactly one knowledge block
        assert_eq!(text.matches(EMPTY_KNOWLEDGE_PLACEHOLDER).count(), 1);
    }
}
