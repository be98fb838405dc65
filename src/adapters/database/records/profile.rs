use crate::domain::profile::ProfileSummary;

#[derive(Debug, sqlx::FromRow)]
pub struct ProfileRecord {
    pub(crate) user_id: String,
    pub(crate) full_name: Option<String>,
    pub(crate) profile_image: Option<String>,
    pub(crate) headline: Option<String>,
}

impl From<ProfileRecord> for ProfileSummary {
    fn from(record: ProfileRecord) -> Self {
        Self {
            user_id: record.user_id,
            full_name: record.full_name,
            profile_image: record.profile_image,
            headline: record.headline,
        }
    }
}
