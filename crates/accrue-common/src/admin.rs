//! Administrative control shared by every aggregate
//!
//! Each aggregate carries one `AdminControl`: the current admin, an optional pending
//! admin for the two-step hand-over, and the pause flag.
//!
//! ```text
//!            transfer_admin(new)            accept_admin (by new)
//!   Settled ────────────────────► Pending ───────────────────────► Settled(new)
//!      ▲                             │
//!      └──── cancel_admin_transfer ──┘
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AccrueError, Result};
use crate::types::address::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminControl {
    admin: Address,
    pending_admin: Option<Address>,
    paused: bool,
}

impl AdminControl {
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            pending_admin: None,
            paused: false,
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn pending_admin(&self) -> Option<Address> {
        self.pending_admin
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Fail `NotAuthorized` unless `caller` is the current admin
    pub fn ensure_admin(&self, caller: &Address) -> Result<()> {
        if *caller != self.admin {
            return Err(AccrueError::not_authorized(format!(
                "{} is not the admin",
                caller.short()
            )));
        }
        Ok(())
    }

    /// Fail `NotAuthorized` while paused
    pub fn ensure_not_paused(&self) -> Result<()> {
        if self.paused {
            return Err(AccrueError::not_authorized("operations are paused"));
        }
        Ok(())
    }

    pub fn pause(&mut self, caller: &Address) -> Result<()> {
        self.ensure_admin(caller)?;
        if self.paused {
            return Err(AccrueError::invalid_state("already paused"));
        }
        self.paused = true;
        info!(admin = %caller.short(), "paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Address) -> Result<()> {
        self.ensure_admin(caller)?;
        if !self.paused {
            return Err(AccrueError::invalid_state("not paused"));
        }
        self.paused = false;
        info!(admin = %caller.short(), "unpaused");
        Ok(())
    }

    /// Step one: nominate a new admin
    pub fn transfer_admin(&mut self, caller: &Address, new_admin: Address) -> Result<()> {
        self.ensure_admin(caller)?;
        if new_admin.is_zero() || new_admin == self.admin {
            return Err(AccrueError::InvalidParameters(
                "new admin must differ from the current admin and be non-zero".into(),
            ));
        }
        self.pending_admin = Some(new_admin);
        info!(admin = %caller.short(), pending = %new_admin.short(), "admin transfer initiated");
        Ok(())
    }

    /// Step two: the nominee takes over
    pub fn accept_admin(&mut self, caller: &Address) -> Result<()> {
        let pending = self
            .pending_admin
            .ok_or_else(|| AccrueError::invalid_state("no pending admin transfer"))?;
        if *caller != pending {
            return Err(AccrueError::not_authorized(format!(
                "{} is not the pending admin",
                caller.short()
            )));
        }
        let previous = self.admin;
        self.admin = pending;
        self.pending_admin = None;
        info!(previous = %previous.short(), admin = %pending.short(), "admin transfer accepted");
        Ok(())
    }

    pub fn cancel_admin_transfer(&mut self, caller: &Address) -> Result<()> {
        self.ensure_admin(caller)?;
        if self.pending_admin.take().is_none() {
            return Err(AccrueError::invalid_state("no pending admin transfer"));
        }
        info!(admin = %caller.short(), "admin transfer cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn setup() -> (AdminControl, Address, Address) {
        let admin = Address::derive("admin");
        let next = Address::derive("next");
        (AdminControl::new(admin), admin, next)
    }

    #[test]
    fn test_two_step_transfer() {
        let (mut control, admin, next) = setup();

        control.transfer_admin(&admin, next).unwrap();
        assert_eq!(control.admin(), admin);
        assert_eq!(control.pending_admin(), Some(next));

        control.accept_admin(&next).unwrap();
        assert_eq!(control.admin(), next);
        assert_eq!(control.pending_admin(), None);
    }

    #[test]
    fn test_accept_by_wrong_caller() {
        let (mut control, admin, next) = setup();
        control.transfer_admin(&admin, next).unwrap();

        let err = control.accept_admin(&admin).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
        assert_eq!(control.admin(), admin);
    }

    #[test]
    fn test_cancel_transfer() {
        let (mut control, admin, next) = setup();
        control.transfer_admin(&admin, next).unwrap();
        control.cancel_admin_transfer(&admin).unwrap();

        assert_eq!(control.pending_admin(), None);
        assert_eq!(
            control.accept_admin(&next).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            control.cancel_admin_transfer(&admin).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn test_non_admin_cannot_initiate() {
        let (mut control, _, next) = setup();
        let err = control.transfer_admin(&next, next).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    #[test]
    fn test_pause_cycle() {
        let (mut control, admin, next) = setup();
        assert!(control.ensure_not_paused().is_ok());

        assert!(control.pause(&next).is_err());
        control.pause(&admin).unwrap();
        assert_eq!(
            control.ensure_not_paused().unwrap_err().kind(),
            ErrorKind::NotAuthorized
        );

        control.unpause(&admin).unwrap();
        assert!(control.ensure_not_paused().is_ok());
    }
}
