use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    #[serde(rename = "Name", default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarForm {
    #[serde(rename = "GravatarEmail", default)]
    pub gravatar_email: String,
}
