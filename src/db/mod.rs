pub mod models;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        // Each CREATE TABLE must be a separate query (Postgres doesn't allow
        // multiple commands in a single prepared statement).

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS conversations (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL DEFAULT 'New Conversation',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                conversation_id UUID NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS training_data (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                source_type TEXT NOT NULL,
                source_name TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS training_files (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                filename TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                file_size BIGINT NOT NULL DEFAULT 0,
                file_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'processing',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                processed_at TIMESTAMPTZ
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS telegram_users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                chat_id BIGINT NOT NULL UNIQUE,
                first_name TEXT,
                last_name TEXT,
                username TEXT,
                phone_number TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS telegram_messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                telegram_user_id UUID NOT NULL REFERENCES telegram_users(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS app_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_conv ON messages(conversation_id, created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, updated_at DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tg_messages_user ON telegram_messages(telegram_user_id, created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn begin(&self) -> anyhow::Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    // ── User / Session Operations ──────────────────────────────────

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<models::User> {
        let user = sqlx::query_as::<_, models::User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<models::User>> {
        let user = sqlx::query_as::<_, models::User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> anyhow::Result<Option<models::User>> {
        let user = sqlx::query_as::<_, models::User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn update_username(&self, id: Uuid, username: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET username = $2 WHERE id = $1")
            .bind(id)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_session(&self, user_id: Uuid) -> anyhow::Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id) VALUES ($1, $2)")
            .bind(&token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(token)
    }

    pub async fn find_session_user(&self, token: &str) -> anyhow::Result<Option<models::User>> {
        let user = sqlx::query_as::<_, models::User>(
            r#"
            SELECT u.* FROM users u
            JOIN sessions s ON s.user_id = u.id
            WHERE s.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn delete_session(&self, token: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── Conversation Operations ────────────────────────────────────

    pub async fn create_conversation(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<models::Conversation> {
        let conv = sqlx::query_as::<_, models::Conversation>(
            "INSERT INTO conversations (user_id) VALUES ($1) RETURNING *",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(conv)
    }

    pub async fn get_conversation(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<models::Conversation>> {
        let conv = sqlx::query_as::<_, models::Conversation>(
            "SELECT * FROM conversations WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(conv)
    }

    pub async fn list_conversations(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<models::ConversationSummary>> {
        let convs = sqlx::query_as::<_, models::ConversationSummary>(
            r#"
            SELECT c.id, c.title, c.created_at, c.updated_at,
                   COUNT(m.id) AS message_count
            FROM conversations c
            LEFT JOIN messages m ON m.conversation_id = c.id
            WHERE c.user_id = $1
            GROUP BY c.id
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(convs)
    }

    pub async fn rename_conversation(&self, id: Uuid, title: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE conversations SET title = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_conversation(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── Message Operations ─────────────────────────────────────────

    pub async fn get_messages(
        &self,
        conversation_id: Uuid,
    ) -> anyhow::Result<Vec<models::Message>> {
        let msgs = sqlx::query_as::<_, models::Message>(
            "SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(msgs)
    }

    /// Insert a message inside an open transaction. Used by the web surface
    /// so the user turn can be rolled back when the exchange fails.
    pub async fn save_message_tx(
        tx: &mut Transaction<'_, Postgres>,
        conversation_id: Uuid,
        role: &str,
        content: &str,
    ) -> anyhow::Result<models::Message> {
        let msg = sqlx::query_as::<_, models::Message>(
            r#"
            INSERT INTO messages (conversation_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .fetch_one(&mut **tx)
        .await?;
        Ok(msg)
    }

    pub async fn set_conversation_title_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        title: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE conversations SET title = $2 WHERE id = $1")
            .bind(id)
            .bind(title)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn touch_conversation_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    // ── Training Data Operations ───────────────────────────────────

    pub async fn add_training_entry(
        &self,
        user_id: Uuid,
        question: &str,
        answer: &str,
        source_type: &str,
        source_name: Option<&str>,
    ) -> anyhow::Result<models::TrainingEntry> {
        let entry = sqlx::query_as::<_, models::TrainingEntry>(
            r#"
            INSERT INTO training_data (user_id, question, answer, source_type, source_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(question)
        .bind(answer)
        .bind(source_type)
        .bind(source_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    pub async fn list_training_data(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<models::TrainingEntry>> {
        let entries = sqlx::query_as::<_, models::TrainingEntry>(
            "SELECT * FROM training_data WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// All knowledge entries, regardless of owner. The prompt context is
    /// built from the whole store.
    pub async fn list_all_training_data(&self) -> anyhow::Result<Vec<models::TrainingEntry>> {
        let entries =
            sqlx::query_as::<_, models::TrainingEntry>("SELECT * FROM training_data")
                .fetch_all(&self.pool)
                .await?;
        Ok(entries)
    }

    pub async fn get_training_entry(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<models::TrainingEntry>> {
        let entry = sqlx::query_as::<_, models::TrainingEntry>(
            "SELECT * FROM training_data WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    pub async fn update_training_entry(
        &self,
        id: Uuid,
        question: &str,
        answer: &str,
    ) -> anyhow::Result<models::TrainingEntry> {
        let entry = sqlx::query_as::<_, models::TrainingEntry>(
            "UPDATE training_data SET question = $2, answer = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(question)
        .bind(answer)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    pub async fn delete_training_entry(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM training_data WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── Training File Operations ───────────────────────────────────

    pub async fn create_training_file(
        &self,
        user_id: Uuid,
        filename: &str,
        original_filename: &str,
        file_size: i64,
        file_type: &str,
    ) -> anyhow::Result<models::TrainingFile> {
        let file = sqlx::query_as::<_, models::TrainingFile>(
            r#"
            INSERT INTO training_files (user_id, filename, original_filename, file_size, file_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(filename)
        .bind(original_filename)
        .bind(file_size)
        .bind(file_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(file)
    }

    pub async fn get_training_file(&self, id: Uuid) -> anyhow::Result<Option<models::TrainingFile>> {
        let file = sqlx::query_as::<_, models::TrainingFile>(
            "SELECT * FROM training_files WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(file)
    }

    pub async fn mark_file_completed(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE training_files SET status = 'completed', processed_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_file_failed(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE training_files SET status = 'failed' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_training_files(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<models::TrainingFile>> {
        let files = sqlx::query_as::<_, models::TrainingFile>(
            "SELECT * FROM training_files WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    // ── Telegram Operations ────────────────────────────────────────

    pub async fn get_or_create_telegram_user(
        &self,
        chat_id: i64,
        first_name: Option<&str>,
        last_name: Option<&str>,
        username: Option<&str>,
    ) -> anyhow::Result<models::TelegramUser> {
        let user = sqlx::query_as::<_, models::TelegramUser>(
            r#"
            INSERT INTO telegram_users (chat_id, first_name, last_name, username)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (chat_id) DO UPDATE SET
                first_name = COALESCE($2, telegram_users.first_name),
                last_name = COALESCE($3, telegram_users.last_name),
                username = COALESCE($4, telegram_users.username)
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(first_name)
        .bind(last_name)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_telegram_user(&self, id: Uuid) -> anyhow::Result<Option<models::TelegramUser>> {
        let user = sqlx::query_as::<_, models::TelegramUser>(
            "SELECT * FROM telegram_users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn set_telegram_phone(&self, id: Uuid, phone_number: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE telegram_users SET phone_number = $2 WHERE id = $1")
            .bind(id)
            .bind(phone_number)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn save_telegram_message(
        &self,
        telegram_user_id: Uuid,
        role: &str,
        content: &str,
    ) -> anyhow::Result<models::TelegramMessage> {
        let msg = sqlx::query_as::<_, models::TelegramMessage>(
            r#"
            INSERT INTO telegram_messages (telegram_user_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(telegram_user_id)
        .bind(role)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(msg)
    }

    /// The most recent `limit` messages for a Telegram user, oldest first.
    pub async fn recent_telegram_messages(
        &self,
        telegram_user_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<models::TelegramMessage>> {
        let msgs = sqlx::query_as::<_, models::TelegramMessage>(
            r#"
            SELECT * FROM (
                SELECT * FROM telegram_messages
                WHERE telegram_user_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            ) recent ORDER BY created_at ASC
            "#,
        )
        .bind(telegram_user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(msgs)
    }

    pub async fn list_telegram_users(&self) -> anyhow::Result<Vec<models::TelegramUser>> {
        let users = sqlx::query_as::<_, models::TelegramUser>(
            "SELECT * FROM telegram_users ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn telegram_user_messages(
        &self,
        telegram_user_id: Uuid,
    ) -> anyhow::Result<Vec<models::TelegramMessage>> {
        let msgs = sqlx::query_as::<_, models::TelegramMessage>(
            "SELECT * FROM telegram_messages WHERE telegram_user_id = $1 ORDER BY created_at ASC",
        )
        .bind(telegram_user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(msgs)
    }

    pub async fn count_telegram_users(&self) -> anyhow::Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM telegram_users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn count_telegram_messages(&self) -> anyhow::Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM telegram_messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    // ── App Setting Operations ─────────────────────────────────────

    pub async fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        let setting = sqlx::query_as::<_, models::AppSetting>(
            "SELECT * FROM app_settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(setting.map(|s| s.value))
    }

    pub async fn set_setting(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = $2,
                updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
