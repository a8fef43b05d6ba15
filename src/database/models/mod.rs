pub mod affiliate;
pub mod principal;
pub mod school;
pub mod student;

pub use affiliate::{AffiliateLink, AffiliateLinks, LinkStatus, LinkedSchool, Relationship};
pub use principal::{PrincipalRow, TeacherRecord};
pub use school::TenantRecord;
pub use student::{
    AccessEvent, Employee, GuardianChild, GuardianEvent, NewEmployee, NewStudent, SchoolClass, Student,
};
