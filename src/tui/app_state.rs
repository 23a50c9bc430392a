/// What the picker hands back once the user has made up their mind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub model: String,
    pub save_as_default: bool,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub(super) enum AppMode {
    Normal,
    Filtering,
    // A model was picked; waiting for y/n on persisting it as the default.
    ConfirmDefault,
}
