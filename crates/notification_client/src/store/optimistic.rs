/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::tools::error::AppError;
use parking_lot::Mutex;
use std::future::Future;

/// Runs an optimistic remote mutation as snapshot -> apply -> commit-or-revert.
///
/// `apply` mutates the state under the lock and returns the snapshot needed to
/// undo it, or `None` when the mutation is a no-op (the remote call is then
/// skipped entirely). When `commit` fails, `revert` runs under the lock with
/// that snapshot. The lock is never held across the await point.
///
/// Returns whether the mutation was applied.
pub(crate) async fn optimistic_mutation<State, Snapshot, Fut>(
    state: &Mutex<State>,
    apply: impl FnOnce(&mut State) -> Option<Snapshot>,
    commit: impl FnOnce() -> Fut,
    revert: impl FnOnce(&mut State, Snapshot),
) -> Result<bool, AppError>
where
    Fut: Future<Output = Result<(), AppError>>,
{
    let snapshot = {
        let mut guard = state.lock();
        apply(&mut guard)
    };
    let Some(snapshot) = snapshot else {
        return Ok(false);
    };

    match commit().await {
        Ok(()) => Ok(true),
        Err(err) => {
            let mut guard = state.lock();
            revert(&mut guard, snapshot);
            Err(err)
        }
    }
}
