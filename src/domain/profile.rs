/// Display fields of a user's profile as stored by the profile service.
///
/// `profile_image` is a blob storage key, not a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    pub user_id: String,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
    pub headline: Option<String>,
}
