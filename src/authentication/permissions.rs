use crate::{
    error::DomainError,
    jwt::SessionData,
    schema::{Id, UserRole},
};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnRelations,

    ManageAllRecipes,
    ManageTags,
    ManageIngredients,
    ManageUsers,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find(|(role, _)| *role == session.role)
            .map(|(_, actions)| actions.contains(&self))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Request-level permission policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    AllowAny,
    IsAuthenticated,
    IsAuthenticatedOrReadOnly,
    /// Reads are open; writes need the author (or an admin).
    IsAuthorOrReadOnly,
}

impl Permission {
    /// `author_id` is the owner of the object being accessed, when there is one.
    pub fn check(
        self,
        session: Option<&SessionData>,
        access: Access,
        author_id: Option<Id>,
    ) -> Result<(), DomainError> {
        match (self, access) {
            (Permission::AllowAny, _) => Ok(()),
            (Permission::IsAuthenticatedOrReadOnly, Access::Read)
            | (Permission::IsAuthorOrReadOnly, Access::Read) => Ok(()),
            (Permission::IsAuthenticated, _) | (Permission::IsAuthenticatedOrReadOnly, _) => {
                session.map(|_| ()).ok_or_else(authentication_required)
            }
            (Permission::IsAuthorOrReadOnly, Access::Write) => {
                let session = session.ok_or_else(authentication_required)?;
                match author_id {
                    Some(author_id) if author_id == session.user_id => Ok(()),
                    _ => session.authenticate(ActionType::ManageAllRecipes),
                }
            }
        }
    }
}

fn authentication_required() -> DomainError {
    DomainError::InvalidSession(String::from("Authentication credentials were not provided"))
}
