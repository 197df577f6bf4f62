//! The eagerly-resolved response bundle.
//!
//! Every string a state can ever send is looked up while the process boots,
//! so a missing group or key in the template file is a startup error and
//! handlers never touch the template at runtime. Strings that embed runtime
//! values (a project title, a login) keep a `%s` placeholder for the handler
//! to fill in.

use standup_core::template::{Template, TemplateError};

#[derive(Debug, Clone)]
pub struct Responses {
    pub root: RootResponses,
    pub add_api_key: AddApiKeyResponses,
    pub daily_status: DailyStatusResponses,
    pub set_default_project: SetDefaultProjectResponses,
}

impl Responses {
    pub fn load(template: &Template) -> Result<Self, TemplateError> {
        Ok(Self {
            root: RootResponses::load(template)?,
            add_api_key: AddApiKeyResponses::load(template)?,
            daily_status: DailyStatusResponses::load(template)?,
            set_default_project: SetDefaultProjectResponses::load(template)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RootResponses {
    // command output
    pub start: String,
    pub help: String,
    pub add_api_key: String,
    pub daily_status: String,
    pub save_only_project_as_default: String,
    pub saved_default_project: String,
    pub set_default_project: String,

    // warnings
    pub user_has_zero_projects: String,
    pub last_projects_page: String,
    pub use_set_default_project: String,

    // errors
    pub private_command_used: String,
    pub unknown_message: String,
    pub no_api_key_added: String,
    pub github_error_generic: String,
}

impl RootResponses {
    fn load(template: &Template) -> Result<Self, TemplateError> {
        Ok(Self {
            start: template.get("root", "start")?,
            help: template.get("root", "help")?,
            add_api_key: template.get("root", "addApiKey")?,
            daily_status: template.get("root", "dailyStatus")?,
            save_only_project_as_default: template.get("root", "saveOnlyProjectAsDefault")?,
            saved_default_project: template.get("root", "savedDefaultProject")?,
            set_default_project: template.get("root", "setDefaultProject")?,
            user_has_zero_projects: template.get("root", "userHasZeroProjects")?,
            last_projects_page: template.get("root", "lastProjectsPage")?,
            use_set_default_project: template.get("root", "useSetDefaultProject")?,
            private_command_used: template.get("root", "privateCommandUsed")?,
            unknown_message: template.get("root", "unknownMessage")?,
            no_api_key_added: template.get("root", "noApiKeyAdded")?,
            github_error_generic: template.get("root", "githubErrorGeneric")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AddApiKeyResponses {
    pub cancel: String,
    pub success: String,
    pub deleted: String,
    pub bad_api_key: String,
    pub key_sent_in_public_chat: String,
}

impl AddApiKeyResponses {
    fn load(template: &Template) -> Result<Self, TemplateError> {
        Ok(Self {
            cancel: template.get("addApiKey", "cancel")?,
            success: template.get("addApiKey", "success")?,
            deleted: template.get("addApiKey", "deleted")?,
            bad_api_key: template.get("addApiKey", "badApiKey")?,
            key_sent_in_public_chat: template.get("addApiKey", "keySentInPublicChat")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DailyStatusResponses {
    pub discovery_of_the_day: String,
    pub questions_and_blockers: String,
    pub github_error_generic: String,
}

impl DailyStatusResponses {
    fn load(template: &Template) -> Result<Self, TemplateError> {
        Ok(Self {
            discovery_of_the_day: template.get("dailyStatus", "discoveryOfTheDay")?,
            questions_and_blockers: template.get("dailyStatus", "questionsAndBlockers")?,
            github_error_generic: template.get("dailyStatus", "githubErrorGeneric")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SetDefaultProjectResponses {
    pub success: String,
    pub github_error_generic: String,
    pub no_api_key_added: String,
}

impl SetDefaultProjectResponses {
    fn load(template: &Template) -> Result<Self, TemplateError> {
        Ok(Self {
            success: template.get("setDefaultProject", "success")?,
            github_error_generic: template.get("setDefaultProject", "githubErrorGeneric")?,
            no_api_key_added: template.get("setDefaultProject", "noApiKeyAdded")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_template_resolves_every_response() {
        let path = concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../assets/telegram/strings.yaml"
        );
        let template = Template::load(path).expect("bundled template loads");

        let responses = Responses::load(&template).expect("every response key resolves");

        assert!(responses.root.daily_status.contains("%s"));
        assert!(responses.add_api_key.success.contains("%s"));
        assert!(!responses.root.help.is_empty());
    }

    #[test]
    fn missing_key_fails_the_load() {
        let template = Template::parse("templates:\n  root:\n    start: [hi]\n")
            .expect("template parses");

        assert!(Responses::load(&template).is_err());
    }
}
