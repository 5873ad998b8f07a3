use chrono::{DateTime, Utc};

use super::super::domain::ApplicationStage;

/// Client-facing sentence for each pipeline stage.
pub fn stage_sentence(stage: ApplicationStage) -> &'static str {
    match stage {
        ApplicationStage::Draft => "Your application is being prepared.",
        ApplicationStage::InProgress => "Your application is currently being worked on.",
        ApplicationStage::Submitted => {
            "Great news! Your application has been submitted to the funder."
        }
        ApplicationStage::Awarded => "Congratulations! Your application has been awarded funding!",
        ApplicationStage::Declined => {
            "We regret to inform you that your application was not successful this time."
        }
        ApplicationStage::Reporting => "Your funded project is now in the reporting phase.",
        ApplicationStage::Closed => "This application has been closed.",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

pub struct StageUpdate<'a> {
    pub recipient_name: Option<&'a str>,
    pub organization: &'a str,
    pub grant_name: &'a str,
    pub stage: ApplicationStage,
    pub at: DateTime<Utc>,
}

pub fn render_stage_update(update: &StageUpdate<'_>) -> RenderedEmail {
    let subject = format!("Application Update: {}", update.grant_name);
    let body = format!(
        "Dear {recipient},\n\
         \n\
         Your grant application status has been updated.\n\
         \n\
         Organization: {organization}\n\
         Grant: {grant}\n\
         New Status: {stage}\n\
         Updated: {at}\n\
         \n\
         {sentence}\n\
         \n\
         If you have any questions, please contact your grant coordinator.\n\
         \n\
         Best regards,\n\
         The Grants Team",
        recipient = update.recipient_name.unwrap_or("Client"),
        organization = update.organization,
        grant = update.grant_name,
        stage = update.stage.title(),
        at = update.at.format("%B %d, %Y at %I:%M %p"),
        sentence = stage_sentence(update.stage),
    );

    RenderedEmail { subject, body }
}

pub struct InvitationEmail<'a> {
    pub recipient_name: Option<&'a str>,
    pub organization: &'a str,
    pub accept_url: &'a str,
    pub expires_at: DateTime<Utc>,
}

pub fn render_invitation(invitation: &InvitationEmail<'_>) -> RenderedEmail {
    let subject = format!("You're invited to the {} grant portal", invitation.organization);
    let body = format!(
        "Hello {recipient},\n\
         \n\
         You have been invited to view grant applications for {organization}.\n\
         \n\
         Accept the invitation to create your account:\n\
         {url}\n\
         \n\
         This link expires on {expires}.\n\
         \n\
         Best regards,\n\
         The Grants Team",
        recipient = invitation.recipient_name.unwrap_or("there"),
        organization = invitation.organization,
        url = invitation.accept_url,
        expires = invitation.expires_at.format("%B %d, %Y"),
    );

    RenderedEmail { subject, body }
}
