//! Texts of the notifications sent to students (Telegram HTML parse mode).

/// Escapes `<`, `>` and `&` for Telegram HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

pub fn lesson_completed(lesson_title: &str, course_title: &str, points: i64) -> String {
    format!(
        "✅ Lesson completed!\n\n📚 <b>{}</b>\nCourse: {}\n\n💎 +{} points",
        escape_html(lesson_title),
        escape_html(course_title),
        points
    )
}

pub fn course_completed(course_title: &str, points: i64) -> String {
    format!(
        "🎓 <b>Congratulations!</b>\n\nYou have completed the course:\n<b>{}</b>\n\n💎 +{} points\n\n📜 Your certificate is available in your profile!",
        escape_html(course_title),
        points
    )
}

pub fn achievement_granted(title: &str, description: &str, points: i64) -> String {
    let mut text = format!("🎉 <b>New achievement!</b>\n\n🏆 <b>{}</b>\n", escape_html(title));
    if !description.is_empty() {
        text.push_str(&escape_html(description));
        text.push('\n');
    }
    if points > 0 {
        text.push_str(&format!("\n💎 +{} points", points));
    }
    text
}

pub fn next_course(course_title: &str) -> String {
    format!(
        "📚 <b>Your next course</b>\n\n<b>{}</b>\n\nKeep learning and growing your skills! 💪",
        escape_html(course_title)
    )
}

pub fn community(title: &str, link: &str, reason: &str) -> String {
    let mut text = format!("💬 <b>Join the community!</b>\n\n<b>{}</b>\n", escape_html(title));
    if !reason.is_empty() {
        text.push_str(&escape_html(reason));
        text.push('\n');
    }
    text.push_str("\nMeet people who share your craft and swap experience! 👥");
    if !link.is_empty() {
        text.push_str(&format!("\n\n🔗 {}", escape_html(link)));
    }
    text
}

pub fn challenge_joined(title: &str, description: &str, points_reward: i64) -> String {
    format!(
        "🎯 <b>You joined a challenge!</b>\n\n<b>{}</b>\n{}\n\n💎 Reward: {} points",
        escape_html(title),
        escape_html(description),
        points_reward
    )
}

pub fn challenge_completed(title: &str, points_reward: i64) -> String {
    format!(
        "🎉 <b>Challenge completed!</b>\n\n🏆 <b>{}</b>\n\n💎 +{} points",
        escape_html(title),
        points_reward
    )
}

pub fn inactivity_reminder(course_title: &str, days_inactive: i64) -> String {
    format!(
        "⏰ <b>Reminder</b>\n\nYou haven't opened <b>{}</b> for {} days.\n\nContinue learning to get your certificate! 🎓",
        escape_html(course_title),
        days_inactive
    )
}

pub fn new_course(course_title: &str, description: &str) -> String {
    format!(
        "🆕 <b>New course available!</b>\n\n📚 <b>{}</b>\n{}\n\nOpen the Mini App to learn more!",
        escape_html(course_title),
        escape_html(description)
    )
}
