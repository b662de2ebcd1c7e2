// SPDX-License-Identifier: LGPL-3.0-or-later OR MPL-2.0
// This file is a part of `airhockey-glow`.
//
// `airhockey-glow` is free software: you can redistribute it and/or modify it under the
// terms of either:
//
// * GNU Lesser General Public License as published by the Free Software Foundation, either
//   version 3 of the License, or (at your option) any later version.
// * Mozilla Public License as published by the Mozilla Foundation, version 2.
//
// `airhockey-glow` is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE. See the GNU Lesser General Public License or the Mozilla Public License for more
// details.
//
// You should have received a copy of the GNU Lesser General Public License and the Mozilla
// Public License along with `airhockey-glow`. If not, see <https://www.gnu.org/licenses/>.

mod setup_context;

pub(crate) use setup_context::{init, run, Context, SurfaceCallbacks};
