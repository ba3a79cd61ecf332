/// Portfolio content repositories
///
/// One repository per resource, each holding the shared pool. Projects and
/// blog posts additionally own a [`crate::tags::Tagging`] for their tag family.

pub mod blog;
pub mod certificate;
pub mod education;
pub mod experience;
pub mod project;
pub mod section;
pub mod setting;
pub mod skill;
pub mod social_link;
pub mod testimonial;

pub use blog::{BlogPost, BlogPostChanges, BlogRepository, NewBlogPost};
pub use certificate::{Certificate, CertificateChanges, CertificateRepository, NewCertificate};
pub use education::{Education, EducationChanges, EducationRepository, NewAchievement, NewEducation};
pub use experience::{
    Experience, ExperienceChanges, ExperienceRelations, ExperienceRepository, NewExperience,
    NewResponsibility,
};
pub use project::{NewProject, Project, ProjectChanges, ProjectRepository};
pub use section::{NewSection, Section, SectionRepository};
pub use setting::{NewSetting, Setting, SettingRepository};
pub use skill::{NewSkill, Skill, SkillChanges, SkillRepository};
pub use social_link::{NewSocialLink, SocialLink, SocialLinkRepository};
pub use testimonial::{NewTestimonial, Testimonial, TestimonialChanges, TestimonialRepository};

use crate::error::{CmsError, CmsResult};

/// Publication states shared by projects and blog posts
pub const PUBLICATION_STATUSES: &[&str] = &["draft", "published", "archived"];

/// Moderation states of testimonials
pub const TESTIMONIAL_STATUSES: &[&str] = &["pending", "approved", "rejected"];

/// Reject values outside a closed set
pub fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> CmsResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(CmsError::Validation(format!(
            "Invalid {} '{}', expected one of: {}",
            field,
            value,
            allowed.join(", ")
        )))
    }
}

/// Reject blank required text
pub fn check_required(field: &str, value: &str) -> CmsResult<()> {
    if value.trim().is_empty() {
        Err(CmsError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}
