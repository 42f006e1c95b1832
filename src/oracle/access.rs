use std::collections::HashSet;

use ethers::types::Address;

use crate::types::{OracleError, OracleResult};

/// 변경 권한 관리
///
/// - admin: 바인딩, 풀 등록, reporter 관리
/// - reporter: 외부 피드 전달 (관측값, 피드 라운드, 환율, 풀 상태, decimals)
///
/// `admin_can_overwrite`는 생성 시 한 번만 정해지며 이후 바뀌지 않는다.
#[derive(Debug, Clone)]
pub struct AccessControl {
    admin: Address,
    reporters: HashSet<Address>,
    admin_can_overwrite: bool,
    permissionless_pools: bool,
}

impl AccessControl {
    pub fn new(admin: Address, admin_can_overwrite: bool, permissionless_pools: bool) -> Self {
        Self {
            admin,
            reporters: HashSet::new(),
            admin_can_overwrite,
            permissionless_pools,
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn admin_can_overwrite(&self) -> bool {
        self.admin_can_overwrite
    }

    pub fn is_admin(&self, caller: Address) -> bool {
        caller == self.admin
    }

    pub fn is_reporter(&self, caller: Address) -> bool {
        self.is_admin(caller) || self.reporters.contains(&caller)
    }

    pub fn ensure_admin(&self, caller: Address) -> OracleResult<()> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(OracleError::Unauthorized(caller))
        }
    }

    pub fn ensure_reporter(&self, caller: Address) -> OracleResult<()> {
        if self.is_reporter(caller) {
            Ok(())
        } else {
            Err(OracleError::Unauthorized(caller))
        }
    }

    /// 풀 등록 권한 (배포 정책에 따라 permissionless 가능)
    pub fn ensure_pool_registrar(&self, caller: Address) -> OracleResult<()> {
        if self.permissionless_pools {
            return Ok(());
        }
        self.ensure_admin(caller)
    }

    /// 이미 바인딩된 자산의 재바인딩 허용 여부
    ///
    /// 호출자와 무관하게 먼저 검사한다.
    pub fn ensure_rebind_allowed(&self, asset: Address, already_bound: bool) -> OracleResult<()> {
        if already_bound && !self.admin_can_overwrite {
            return Err(OracleError::OverwriteForbidden(asset));
        }
        Ok(())
    }

    pub fn add_reporter(&mut self, reporter: Address) -> bool {
        self.reporters.insert(reporter)
    }

    pub fn remove_reporter(&mut self, reporter: Address) -> bool {
        self.reporters.remove(&reporter)
    }

    pub fn reporters(&self) -> impl Iterator<Item = &Address> {
        self.reporters.iter()
    }
}
